//! Parameter set images (`<application>_<safe|non_safe>.syde_psi`).
//!
//! An image holds the NVM content of a HALC NVM data pool: one raw block
//! per list, each protected by a leading CRC16, plus the same values as a
//! named list for tools that display them. The whole file is closed by a
//! CRC32.
//!
//! Layout (little endian unless noted):
//!
//! ```text
//! magic "SYDEPSI\0"
//! u16 format version, u8 safety, u8 reserved
//! u32 data pool definition hash, u32 HALC definition hash
//! u16 length + data pool name
//! u16 block count, per block: u32 address, u32 size, bytes
//! u16 entry count, per entry: u16 length + "List.Element", u8 type, u8 array, u16 count,
//!   values
//! u32 CRC32 over everything before it
//! ```

use std::path::{Path, PathBuf};

use osy_core::hash::{crc16, FILE_CRC32};
use osy_core::*;

use crate::text::write_file;
use crate::{Codegen, CodegenError};

pub const PSI_MAGIC: &[u8; 8] = b"SYDEPSI\0";
pub const PSI_FORMAT_VERSION: u16 = 1;
pub const PSI_EXTENSION: &str = "syde_psi";

/// Bytes of the CRC16 at the start of every raw block.
const BLOCK_CRC_SIZE: usize = 2;

/// Compute the CRC16 over `block[2..]` and store it big endian in
/// `block[0..2]`.
pub fn insert_crc16(block: &mut [u8]) -> Result<(), CodegenError> {
    if block.len() < BLOCK_CRC_SIZE {
        return Err(CodegenError::config(format!(
            "Cannot protect a block of {} bytes with a CRC16.",
            block.len()
        )));
    }

    let crc = crc16(&block[BLOCK_CRC_SIZE..]);
    block[..BLOCK_CRC_SIZE].copy_from_slice(&crc.to_be_bytes());
    Ok(())
}

/// Whether the leading CRC16 of `block` matches its payload.
pub fn check_crc16(block: &[u8]) -> bool {
    block.len() >= BLOCK_CRC_SIZE
        && block[..BLOCK_CRC_SIZE] == crc16(&block[BLOCK_CRC_SIZE..]).to_be_bytes()
}

/// File name of the image of `case` for application `app`.
pub fn psi_file_name(app: &str, case: SafetyCase) -> String {
    format!("{}_{}.{PSI_EXTENSION}", app.to_lowercase(), case.file_tag())
}

/// Raw NVM content of one list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PsiBlock {
    /// Absolute NVM address.
    pub address: u32,
    /// CRC16 followed by the list values.
    pub data: Vec<u8>,
}

/// Interpreted value of one element.
#[derive(Clone, Debug, PartialEq)]
pub struct PsiEntry {
    /// `List.Element`
    pub name: String,
    pub value: Content,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ParamSetImage {
    pub safety: bool,
    pub datapool_hash: u32,
    pub halc_hash: u32,
    pub datapool_name: String,
    pub blocks: Vec<PsiBlock>,
    pub entries: Vec<PsiEntry>,
}

impl ParamSetImage {
    /// Build the image of a HALC NVM data pool.
    ///
    /// The configuration list is filled from its single dataset, all other
    /// lists are zero filled.
    pub fn from_datapool(pool: &DataPool, halc_hash: u32) -> Result<Self, CodegenError> {
        if pool.lists.len() != HalcCategory::ALL.len() {
            return Err(CodegenError::config(format!(
                "HALC NVM data pool `{}` has {} lists, expected {}.",
                pool.name,
                pool.lists.len(),
                HalcCategory::ALL.len()
            )));
        }

        let mut blocks = Vec::new();
        let mut entries = Vec::new();

        for (pos, list) in pool.lists.iter().enumerate() {
            let is_config = pos == HalcCategory::Configuration.list_index().get();
            let values: Vec<&Content> = if is_config {
                match list.datasets.as_slice() {
                    [ds] => ds.values.iter().collect(),
                    _ => {
                        return Err(CodegenError::config(format!(
                            "Configuration list of `{}` has {} datasets, expected exactly one.",
                            pool.name,
                            list.datasets.len()
                        )))
                    }
                }
            } else {
                list.elements.iter().map(|e| &e.value).collect()
            };

            let mut data = vec![0u8; list.nvm_size as usize];
            if data.len() < BLOCK_CRC_SIZE {
                return Err(CodegenError::config(format!(
                    "List `{}.{}` has an NVM size of {} bytes, which leaves no room for its CRC.",
                    pool.name, list.name, list.nvm_size
                )));
            }

            for (elem, value) in list.elements.iter().zip(&values) {
                let start = elem.nvm_start_address as usize;
                let bytes = value.to_le_bytes();
                let end = start + bytes.len();

                if start < BLOCK_CRC_SIZE || end > data.len() {
                    return Err(CodegenError::config(format!(
                        "Element `{}.{}.{}` at offset {start} does not fit into the {} bytes of its list.",
                        pool.name,
                        list.name,
                        elem.name,
                        data.len()
                    )));
                }

                if is_config {
                    data[start..end].copy_from_slice(&bytes);
                }

                entries.push(PsiEntry {
                    name: format!("{}.{}", list.name, elem.name),
                    value: if is_config {
                        (*value).clone()
                    } else {
                        Content::zeroed(elem.ty(), elem.value.is_array().then(|| elem.value.len()))
                    },
                });
            }

            insert_crc16(&mut data)?;
            blocks.push(PsiBlock {
                address: pool.nvm_start_address + list.nvm_start_address,
                data,
            });
        }

        Ok(Self {
            safety: pool.safety,
            datapool_hash: pool.definition_hash(),
            halc_hash,
            datapool_name: pool.name.clone(),
            blocks,
            entries,
        })
    }

    /// Image content without the trailing CRC32.
    fn content(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(PSI_MAGIC);
        out.extend_from_slice(&PSI_FORMAT_VERSION.to_le_bytes());
        out.extend_from_slice(&[u8::from(self.safety), 0]);
        out.extend_from_slice(&self.datapool_hash.to_le_bytes());
        out.extend_from_slice(&self.halc_hash.to_le_bytes());
        put_str(&mut out, &self.datapool_name);

        out.extend_from_slice(&(self.blocks.len() as u16).to_le_bytes());
        for b in &self.blocks {
            out.extend_from_slice(&b.address.to_le_bytes());
            out.extend_from_slice(&(b.data.len() as u32).to_le_bytes());
            out.extend_from_slice(&b.data);
        }

        out.extend_from_slice(&(self.entries.len() as u16).to_le_bytes());
        for e in &self.entries {
            put_str(&mut out, &e.name);
            out.extend_from_slice(&[e.value.ty().tag(), u8::from(e.value.is_array())]);
            out.extend_from_slice(&(e.value.len() as u16).to_le_bytes());
            out.extend_from_slice(&e.value.to_le_bytes());
        }

        out
    }

    /// Complete image including the trailing CRC32.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = self.content();
        let crc = FILE_CRC32.checksum(&out);
        out.extend_from_slice(&crc.to_le_bytes());
        out
    }

    /// Write the image to `path`, replacing an existing file.
    ///
    /// The content is written first and the CRC32 appended in a second step,
    /// so a file without a valid trailing CRC was never completed.
    pub fn write(&self, path: &Path) -> Result<(), CodegenError> {
        if path.exists() {
            std::fs::remove_file(path).map_err(|source| CodegenError::Write {
                path: path.into(),
                source,
            })?;
        }

        let content = self.content();
        write_file(path, &content)?;

        let crc = FILE_CRC32.checksum(&content);
        append(path, &crc.to_le_bytes())?;

        log::info!("Generated {}", path.display());
        Ok(())
    }

    /// Parse an image and verify its CRC32 and the CRC16 of every block.
    pub fn read(bytes: &[u8]) -> Result<Self, CodegenError> {
        let Some((content, crc)) = bytes.split_last_chunk::<4>() else {
            return Err(invalid("file too short"));
        };

        if FILE_CRC32.checksum(content) != u32::from_le_bytes(*crc) {
            return Err(invalid("file CRC mismatch"));
        }

        let mut r = Reader { bytes: content };
        if r.take(PSI_MAGIC.len())? != PSI_MAGIC {
            return Err(invalid("bad magic"));
        }

        let version = r.u16()?;
        if version != PSI_FORMAT_VERSION {
            return Err(invalid(&format!("unknown format version {version}")));
        }

        let safety = r.u8()? != 0;
        let _reserved = r.u8()?;
        let datapool_hash = r.u32()?;
        let halc_hash = r.u32()?;
        let datapool_name = r.str()?;

        let mut blocks = Vec::new();
        for _ in 0..r.u16()? {
            let address = r.u32()?;
            let size = r.u32()? as usize;
            let data = r.take(size)?.to_vec();
            if !check_crc16(&data) {
                return Err(invalid(&format!("CRC16 mismatch in block at 0x{address:08X}")));
            }
            blocks.push(PsiBlock { address, data });
        }

        let mut entries = Vec::new();
        for _ in 0..r.u16()? {
            let name = r.str()?;
            let ty = ContentType::from_tag(r.u8()?).ok_or_else(|| invalid("unknown value type"))?;
            let is_array = r.u8()? != 0;
            let count = usize::from(r.u16()?);
            let size = ty.size() as usize;

            let raw = r.take(count * size)?;
            let values = raw
                .chunks_exact(size)
                .map(|c| Scalar::from_le_bytes(ty, c))
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| invalid("bad value"))?;

            let value = match values.as_slice() {
                [v] if !is_array => Content::scalar(ty, *v),
                _ => Content::array(ty, values),
            }
            .map_err(|e| invalid(&e.to_string()))?;

            entries.push(PsiEntry { name, value });
        }

        if !r.bytes.is_empty() {
            return Err(invalid("trailing bytes"));
        }

        Ok(Self {
            safety,
            datapool_hash,
            halc_hash,
            datapool_name,
            blocks,
            entries,
        })
    }
}

fn put_str(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(&(s.len() as u16).to_le_bytes());
    out.extend_from_slice(s.as_bytes());
}

fn append(path: &Path, bytes: &[u8]) -> Result<(), CodegenError> {
    use std::io::Write;

    std::fs::OpenOptions::new()
        .append(true)
        .open(path)
        .and_then(|mut f| f.write_all(bytes))
        .map_err(|source| CodegenError::Write {
            path: path.into(),
            source,
        })
}

fn invalid(reason: &str) -> CodegenError {
    CodegenError::Config(format!("Invalid parameter set image: {reason}."))
}

struct Reader<'a> {
    bytes: &'a [u8],
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], CodegenError> {
        if self.bytes.len() < n {
            return Err(invalid("unexpected end of file"));
        }
        let (head, tail) = self.bytes.split_at(n);
        self.bytes = tail;
        Ok(head)
    }

    fn u8(&mut self) -> Result<u8, CodegenError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, CodegenError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, CodegenError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn str(&mut self) -> Result<String, CodegenError> {
        let len = usize::from(self.u16()?);
        String::from_utf8(self.take(len)?.to_vec()).map_err(|_| invalid("name is not UTF-8"))
    }
}

impl<'n> Codegen<'n> {
    /// HALC NVM data pools the parameter set images are made of, one per
    /// safety case.
    fn psi_pools(&self) -> Result<Vec<(SafetyCase, &'n DataPool)>, CodegenError> {
        let halc = self
            .node
            .halc
            .as_ref()
            .ok_or_else(|| CodegenError::config("Node has no HALC definition."))?;

        halc.mode
            .safety_cases()
            .iter()
            .map(|&case| {
                self.node
                    .datapools
                    .iter()
                    .find(|p| p.kind == DataPoolKind::HalcNvm && p.safety == case.is_safe())
                    .map(|p| (case, p))
                    .ok_or_else(|| {
                        CodegenError::config(format!(
                            "Node has no {} HALC NVM data pool.",
                            case.file_tag()
                        ))
                    })
            })
            .collect()
    }

    /// Build the parameter set images of this application, with their file
    /// names.
    pub fn param_set_images(&self) -> Result<Vec<(String, ParamSetImage)>, CodegenError> {
        let halc_hash = self
            .node
            .halc
            .as_ref()
            .map(DefinitionHash::definition_hash)
            .unwrap_or_default();

        self.psi_pools()?
            .into_iter()
            .map(|(case, pool)| {
                Ok((
                    psi_file_name(&self.app().name, case),
                    ParamSetImage::from_datapool(pool, halc_hash)?,
                ))
            })
            .collect()
    }

    /// Write all parameter set images into `dir`.
    pub fn psi_files(&self, dir: &Path) -> Result<Vec<PathBuf>, CodegenError> {
        let mut paths = Vec::new();
        for (name, image) in self.param_set_images()? {
            let path = dir.join(name);
            image.write(&path)?;
            paths.push(path);
        }

        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc16_round_trip() {
        let mut block = vec![0, 0, 1, 2, 3, 4, 5];
        insert_crc16(&mut block).unwrap();
        assert!(check_crc16(&block));

        let expected = crc16(&block[2..]).to_be_bytes();
        assert_eq!(block[..2], expected);

        block[4] ^= 0xFF;
        assert!(!check_crc16(&block));
    }

    #[test]
    fn crc16_of_empty_payload() {
        let mut block = [0xAA, 0xBB];
        insert_crc16(&mut block).unwrap();
        assert_eq!(block, crc16(&[]).to_be_bytes());
    }

    #[test]
    fn crc16_rejects_short_buffers() {
        let mut block = [0x55];
        assert!(matches!(insert_crc16(&mut block), Err(CodegenError::Config(_))));
        assert_eq!(block, [0x55]);

        assert!(insert_crc16(&mut []).is_err());
    }

    #[test]
    fn file_names() {
        assert_eq!(psi_file_name("Params", SafetyCase::Safe), "params_safe.syde_psi");
        assert_eq!(psi_file_name("Params", SafetyCase::NonSafe), "params_non_safe.syde_psi");
    }

    #[test]
    fn reader_rejects_corruption() {
        let image = ParamSetImage {
            safety: true,
            datapool_hash: 1,
            halc_hash: 2,
            datapool_name: "Halc".into(),
            blocks: vec![PsiBlock {
                address: 0,
                data: {
                    let mut d = vec![0, 0, 7];
                    insert_crc16(&mut d).unwrap();
                    d
                },
            }],
            entries: vec![PsiEntry {
                name: "Configuration.X".into(),
                value: Content::scalar(ContentType::U8, 7u8).unwrap(),
            }],
        };

        let bytes = image.to_bytes();
        assert_eq!(ParamSetImage::read(&bytes).unwrap(), image);

        let mut broken = bytes.clone();
        broken[10] ^= 1;
        assert!(ParamSetImage::read(&broken).is_err());
        assert!(ParamSetImage::read(&bytes[..3]).is_err());
    }
}
