//! IPTC IIM datasets wrapped in Photoshop image resources, as stored in a
//! JPEG APP13 segment.

pub(crate) const PHOTOSHOP_SIGNATURE: &[u8] = b"Photoshop 3.0\0";
pub(crate) const IPTC_RESOURCE_ID: u16 = 0x0404;

const TAG_MARKER: u8 = 0x1C;
const RESOURCE_SIGNATURE: &[u8; 4] = b"8BIM";
const UTF8_CHARSET: &[u8] = b"\x1B%G";

pub(crate) const TITLE_LIMIT: usize = 64;
pub(crate) const CAPTION_LIMIT: usize = 2000;
pub(crate) const KEYWORD_LIMIT: usize = 64;
pub(crate) const BYLINE_LIMIT: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Tag(pub u8, pub u8);

impl Tag {
    pub const CODED_CHARSET: Tag = Tag(1, 90);
    pub const RECORD_VERSION: Tag = Tag(2, 0);
    pub const OBJECT_NAME: Tag = Tag(2, 5);
    pub const KEYWORDS: Tag = Tag(2, 25);
    pub const BYLINE: Tag = Tag(2, 80);
    pub const CAPTION: Tag = Tag(2, 120);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DataSet {
    pub tag: Tag,
    pub data: Vec<u8>,
}

impl DataSet {
    fn new(tag: Tag, data: impl Into<Vec<u8>>) -> Self {
        Self {
            tag,
            data: data.into(),
        }
    }

    fn text(tag: Tag, value: &str, limit: usize) -> Self {
        Self::new(tag, truncate_utf8(value, limit).as_bytes())
    }

    pub fn decoded(&self) -> String {
        match String::from_utf8(self.data.clone()) {
            Ok(text) => text,
            // Pre-UTF-8 files are almost always Latin-1.
            Err(err) => err.into_bytes().iter().map(|&b| char::from(b)).collect(),
        }
    }
}

/// The values written by one successful description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IptcFields {
    pub title: String,
    pub caption: String,
    pub keywords: Vec<String>,
    pub byline: Option<String>,
}

impl IptcFields {
    fn datasets(&self) -> Vec<DataSet> {
        let mut datasets = vec![
            DataSet::new(Tag::CODED_CHARSET, UTF8_CHARSET),
            DataSet::new(Tag::RECORD_VERSION, [0x00, 0x04]),
            DataSet::text(Tag::OBJECT_NAME, &self.title, TITLE_LIMIT),
        ];
        datasets.extend(
            self.keywords
                .iter()
                .map(|keyword| DataSet::text(Tag::KEYWORDS, keyword, KEYWORD_LIMIT)),
        );
        if let Some(byline) = &self.byline {
            datasets.push(DataSet::text(Tag::BYLINE, byline, BYLINE_LIMIT));
        }
        datasets.push(DataSet::text(Tag::CAPTION, &self.caption, CAPTION_LIMIT));
        datasets
    }

    fn replaces(&self, tag: Tag) -> bool {
        matches!(
            tag,
            Tag::CODED_CHARSET
                | Tag::RECORD_VERSION
                | Tag::OBJECT_NAME
                | Tag::KEYWORDS
                | Tag::CAPTION
        ) || (tag == Tag::BYLINE && self.byline.is_some())
    }

    /// Overlays these fields onto `existing`, keeping every dataset it does not
    /// replace. Datasets come out ordered by record and number.
    pub(crate) fn merge_into(&self, existing: Vec<DataSet>) -> Vec<DataSet> {
        let mut merged: Vec<DataSet> = existing
            .into_iter()
            .filter(|dataset| !self.replaces(dataset.tag))
            .collect();
        merged.extend(self.datasets());
        merged.sort_by_key(|dataset| (dataset.tag.0, dataset.tag.1));
        merged
    }

    pub(crate) fn from_datasets(datasets: &[DataSet]) -> Self {
        let first = |tag: Tag| {
            datasets
                .iter()
                .find(|dataset| dataset.tag == tag)
                .map(DataSet::decoded)
        };
        Self {
            title: first(Tag::OBJECT_NAME).unwrap_or_default(),
            caption: first(Tag::CAPTION).unwrap_or_default(),
            keywords: datasets
                .iter()
                .filter(|dataset| dataset.tag == Tag::KEYWORDS)
                .map(DataSet::decoded)
                .collect(),
            byline: first(Tag::BYLINE),
        }
    }
}

/// Cuts `value` to at most `limit` bytes without splitting a character.
pub(crate) fn truncate_utf8(value: &str, limit: usize) -> &str {
    if value.len() <= limit {
        return value;
    }
    let mut end = limit;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}

pub(crate) fn parse_datasets(block: &[u8]) -> Result<Vec<DataSet>, String> {
    let mut datasets = Vec::new();
    let mut pos = 0;

    while pos < block.len() {
        if block[pos] != TAG_MARKER {
            // Writers pad the resource with zeros.
            if block[pos..].iter().all(|&b| b == 0) {
                break;
            }
            return Err(format!("unexpected byte 0x{:02X} in IPTC block", block[pos]));
        }
        let header = block
            .get(pos + 1..pos + 5)
            .ok_or("truncated IPTC dataset header")?;
        let tag = Tag(header[0], header[1]);
        let mut length = u16::from_be_bytes([header[2], header[3]]) as usize;
        pos += 5;

        if length & 0x8000 != 0 {
            let width = length & 0x7FFF;
            if width == 0 || width > 4 {
                return Err(format!("unsupported extended length of {width} bytes"));
            }
            let bytes = block
                .get(pos..pos + width)
                .ok_or("truncated IPTC extended length")?;
            length = bytes.iter().fold(0usize, |acc, &b| (acc << 8) | b as usize);
            pos += width;
        }

        let data = block
            .get(pos..pos + length)
            .ok_or_else(|| format!("IPTC dataset {}:{} overruns the block", tag.0, tag.1))?;
        datasets.push(DataSet::new(tag, data));
        pos += length;
    }

    Ok(datasets)
}

pub(crate) fn encode_datasets(datasets: &[DataSet]) -> Vec<u8> {
    let mut out = Vec::new();
    for dataset in datasets {
        out.extend_from_slice(&[TAG_MARKER, dataset.tag.0, dataset.tag.1]);
        let length = dataset.data.len();
        if length < 0x8000 {
            out.extend_from_slice(&(length as u16).to_be_bytes());
        } else {
            out.extend_from_slice(&0x8004u16.to_be_bytes());
            out.extend_from_slice(&(length as u32).to_be_bytes());
        }
        out.extend_from_slice(&dataset.data);
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ImageResource {
    pub signature: [u8; 4],
    pub id: u16,
    pub name: Vec<u8>,
    pub data: Vec<u8>,
}

impl ImageResource {
    pub fn iptc(data: Vec<u8>) -> Self {
        Self {
            signature: *RESOURCE_SIGNATURE,
            id: IPTC_RESOURCE_ID,
            name: Vec::new(),
            data,
        }
    }
}

pub(crate) fn parse_resources(data: &[u8]) -> Result<Vec<ImageResource>, String> {
    let mut resources = Vec::new();
    let mut pos = 0;

    while pos + 4 <= data.len() {
        let signature: [u8; 4] = data[pos..pos + 4]
            .try_into()
            .map_err(|_| "truncated resource signature")?;
        if !signature.iter().all(u8::is_ascii_alphanumeric) {
            break;
        }
        let id_bytes = data.get(pos + 4..pos + 6).ok_or("truncated resource id")?;
        let id = u16::from_be_bytes([id_bytes[0], id_bytes[1]]);
        pos += 6;

        let name_len = *data.get(pos).ok_or("truncated resource name")? as usize;
        let name = data
            .get(pos + 1..pos + 1 + name_len)
            .ok_or("truncated resource name")?
            .to_vec();
        pos += padded(1 + name_len);

        let size_bytes = data.get(pos..pos + 4).ok_or("truncated resource size")?;
        let size = u32::from_be_bytes([size_bytes[0], size_bytes[1], size_bytes[2], size_bytes[3]])
            as usize;
        pos += 4;

        let body = data
            .get(pos..pos + size)
            .ok_or_else(|| format!("image resource 0x{id:04X} overruns the segment"))?
            .to_vec();
        pos += padded(size);

        resources.push(ImageResource {
            signature,
            id,
            name,
            data: body,
        });
    }

    Ok(resources)
}

pub(crate) fn encode_resources(resources: &[ImageResource]) -> Vec<u8> {
    let mut out = Vec::new();
    for resource in resources {
        out.extend_from_slice(&resource.signature);
        out.extend_from_slice(&resource.id.to_be_bytes());

        let name = &resource.name[..resource.name.len().min(255)];
        out.push(name.len() as u8);
        out.extend_from_slice(name);
        if (1 + name.len()) % 2 != 0 {
            out.push(0);
        }

        out.extend_from_slice(&(resource.data.len() as u32).to_be_bytes());
        out.extend_from_slice(&resource.data);
        if resource.data.len() % 2 != 0 {
            out.push(0);
        }
    }
    out
}

fn padded(len: usize) -> usize {
    len + len % 2
}
