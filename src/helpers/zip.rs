//! ZIP archive helpers for the Office Open XML and OpenDocument containers

use crate::error::BentoError;
use crate::helpers::xml::XmlReader;
use std::io::BufReader;
use std::io::Read;
use std::io::Seek;
use zip::read::ZipFile;
use zip::result::ZipError;
use zip::ZipArchive;

pub(crate) trait ZipHelper<RS: Read + Seek> {
    /// Whether an entry exists, matched case-insensitively
    fn contains(&self, name: &str) -> bool;

    /// Gets an entry by name (case-insensitive, path separator agnostic)
    fn file(&'_ mut self, name: &str) -> Result<Option<ZipFile<'_, RS>>, BentoError>;

    /// Creates an XML reader over an entry
    fn xml_reader(
        &'_ mut self,
        name: &str,
    ) -> Result<Option<XmlReader<BufReader<ZipFile<'_, RS>>>>, BentoError>;
}

impl<RS: Read + Seek> ZipHelper<RS> for ZipArchive<RS> {
    fn contains(&self, name: &str) -> bool {
        find_entry(self, name).is_some()
    }

    fn file(&'_ mut self, name: &str) -> Result<Option<ZipFile<'_, RS>>, BentoError> {
        match find_entry(self, name).map(|entry| self.by_name(&entry)).transpose() {
            Ok(file) => Ok(file),
            Err(ZipError::FileNotFound) => Ok(None),
            Err(error) => Err(error)?,
        }
    }

    fn xml_reader(
        &'_ mut self,
        name: &str,
    ) -> Result<Option<XmlReader<BufReader<ZipFile<'_, RS>>>>, BentoError> {
        let reader = self
            .file(name)?
            .map(|file| XmlReader::new(BufReader::new(file)));
        Ok(reader)
    }
}

fn find_entry<RS: Read + Seek>(zip: &ZipArchive<RS>, name: &str) -> Option<String> {
    let pattern = name.replace('\\', "/");
    zip.file_names()
        .find(|file_name| pattern.eq_ignore_ascii_case(&file_name.replace('\\', "/")))
        .map(str::to_owned)
}
