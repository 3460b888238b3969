//! Archive extraction.
//!
//! Zip and gzipped tar archives are handled in process, anything else is handed to 7-Zip.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
	#[error("IO error: {0}")]
	IO(#[from] std::io::Error),
	#[error("zip error: {0}")]
	Zip(#[from] zip::result::ZipError),
	#[error("7-Zip executable {0} not found.")]
	SevenZipMissing(PathBuf),
	#[error("7-Zip exited with {status}: {message}")]
	SevenZipFailed { status: String, message: String },
}

/// Unpacks an archive into a directory. Pass/fail only.
pub trait Extractor: Send + Sync {
	fn extract(&self, archive: &Path, destination: &Path) -> Result<(), ExtractError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
	Zip,
	TarGz,
	/// Left to 7-Zip, covers 7z and rar among others.
	Other,
}

impl ArchiveFormat {
	/// Guesses the format from the first bytes of the file.
	pub fn sniff(archive: &Path) -> std::io::Result<Self> {
		let mut magic = [0u8; 4];
		let mut file = std::fs::File::open(archive)?;
		let read = file.read(&mut magic)?;
		Ok(match &magic[..read] {
			[b'P', b'K', 3, 4] | [b'P', b'K', 5, 6] => ArchiveFormat::Zip,
			[0x1f, 0x8b, ..] => ArchiveFormat::TarGz,
			_ => ArchiveFormat::Other,
		})
	}
}

/// Default [`Extractor`].
#[derive(Debug, Clone)]
pub struct ArchiveExtractor {
	sevenzip: PathBuf,
}

impl ArchiveExtractor {
	/// # Parameters
	/// - `sevenzip` - 7-Zip executable, see [`Config::sevenzip_command`](crate::Config::sevenzip_command).
	pub fn new(sevenzip: impl Into<PathBuf>) -> Self {
		Self { sevenzip: sevenzip.into() }
	}

	fn extract_zip(archive: &Path, destination: &Path) -> Result<(), ExtractError> {
		let file = std::fs::File::open(archive)?;
		let mut zip = zip::ZipArchive::new(std::io::BufReader::new(file))?;
		zip.extract(destination)?;
		Ok(())
	}

	fn extract_tar_gz(archive: &Path, destination: &Path) -> Result<(), ExtractError> {
		let file = std::fs::File::open(archive)?;
		let gz = flate2::read::GzDecoder::new(std::io::BufReader::new(file));
		tar::Archive::new(gz).unpack(destination)?;
		Ok(())
	}

	fn extract_with_7z(&self, archive: &Path, destination: &Path) -> Result<(), ExtractError> {
		let mut out_flag = std::ffi::OsString::from("-o");
		out_flag.push(destination);

		let output = Command::new(&self.sevenzip)
			.arg("x")
			.arg("-y")
			.arg(out_flag)
			.arg(archive)
			.stdin(Stdio::null())
			.stdout(Stdio::null())
			.stderr(Stdio::piped())
			.output()
			.map_err(|e| match e.kind() {
				std::io::ErrorKind::NotFound => ExtractError::SevenZipMissing(self.sevenzip.clone()),
				_ => ExtractError::IO(e),
			})?;

		if output.status.success() {
			Ok(())
		} else {
			Err(ExtractError::SevenZipFailed {
				status: output.status.to_string(),
				message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
			})
		}
	}
}

impl Extractor for ArchiveExtractor {
	fn extract(&self, archive: &Path, destination: &Path) -> Result<(), ExtractError> {
		std::fs::create_dir_all(destination)?;
		let format = ArchiveFormat::sniff(archive)?;
		log::debug!("Extracting {} ({:?}) to {}", archive.display(), format, destination.display());

		match format {
			ArchiveFormat::Zip => Self::extract_zip(archive, destination),
			ArchiveFormat::TarGz => Self::extract_tar_gz(archive, destination),
			ArchiveFormat::Other => self.extract_with_7z(archive, destination),
		}
	}
}

#[cfg(test)]
mod test {
	use std::io::Write;

	use super::*;

	fn write_tar_gz(path: &Path, name: &str, data: &[u8]) {
		let gz = flate2::write::GzEncoder::new(std::fs::File::create(path).unwrap(), flate2::Compression::default());
		let mut builder = tar::Builder::new(gz);
		let mut header = tar::Header::new_gnu();
		header.set_size(data.len() as u64);
		header.set_mode(0o644);
		header.set_cksum();
		builder.append_data(&mut header, name, data).unwrap();
		builder.into_inner().unwrap().finish().unwrap();
	}

	#[test]
	fn formats_sniffed_from_content() {
		let dir = tempfile::tempdir().unwrap();

		let zip_path = dir.path().join("misnamed.7z");
		let mut zip = zip::ZipWriter::new(std::fs::File::create(&zip_path).unwrap());
		zip.start_file("a.esp", zip::write::FileOptions::default()).unwrap();
		zip.write_all(b"esp").unwrap();
		zip.finish().unwrap();
		assert_eq!(ArchiveFormat::sniff(&zip_path).unwrap(), ArchiveFormat::Zip);

		let tgz_path = dir.path().join("package.tar.gz");
		write_tar_gz(&tgz_path, "Mod/b.esp", b"esp");
		assert_eq!(ArchiveFormat::sniff(&tgz_path).unwrap(), ArchiveFormat::TarGz);

		let other = dir.path().join("tiny");
		std::fs::write(&other, b"7z").unwrap();
		assert_eq!(ArchiveFormat::sniff(&other).unwrap(), ArchiveFormat::Other);
	}

	#[test]
	fn extracts_in_process() {
		let dir = tempfile::tempdir().unwrap();
		let tgz_path = dir.path().join("package.tar.gz");
		write_tar_gz(&tgz_path, "Mod/b.esp", b"esp");

		let extractor = ArchiveExtractor::new("/nonexistent/7z");
		extractor.extract(&tgz_path, &dir.path().join("out")).unwrap();
		assert_eq!(std::fs::read(dir.path().join("out/Mod/b.esp")).unwrap(), b"esp");
	}

	#[test]
	fn missing_sevenzip_reported() {
		let dir = tempfile::tempdir().unwrap();
		let archive = dir.path().join("package.7z");
		std::fs::write(&archive, b"7z\xbc\xaf\x27\x1c").unwrap();

		let extractor = ArchiveExtractor::new("/nonexistent/7z");
		let result = extractor.extract(&archive, &dir.path().join("out"));
		assert!(matches!(result, Err(ExtractError::SevenZipMissing(_))));
	}
}
