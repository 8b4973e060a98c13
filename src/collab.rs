//! Collaborator seams: content generation, brochure persistence, blob storage
//! and sessions. The export engine only depends on these interfaces; a host
//! application supplies the implementations.

use crate::request::{BriefParams, BrochureContent, ContactDetails, ExportRequest};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

/// Identifier of the signed-in user that owns brochures and uploads
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolves the current session, if any
pub trait SessionProvider {
    fn current_user(&self) -> Option<UserId>;
}

/// Turns a business brief into brochure copy.
///
/// Implementations usually call a language model with [`BriefParams::prompt`]
/// and hand the reply to [`crate::request::parse_generated_content`].
pub trait ContentGenerator {
    fn generate(&self, params: &BriefParams) -> Result<BrochureContent>;
}

/// A saved brochure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrochureRecord {
    pub id: String,
    pub owner: UserId,
    pub title: String,
    #[serde(default)]
    pub brief: String,
    pub content: Option<BrochureContent>,
    pub template: String,
    pub brand_color: Option<String>,
    pub logo_url: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    pub contact_details: Option<ContactDetails>,
}

impl BrochureRecord {
    /// The export request for this brochure, or `None` before content exists
    pub fn export_request(&self) -> Option<ExportRequest> {
        let content = self.content.clone()?;
        let mut req = ExportRequest::new(content);
        req.template = self.template.clone();
        if let Some(color) = self.brand_color.as_ref().filter(|c| !c.is_empty()) {
            req.brand_color = color.clone();
        }
        req.logo_url = self.logo_url.clone();
        req.images = self.images.clone();
        req.contact_details = self.contact_details.clone().unwrap_or_default();
        Some(req)
    }
}

/// Brochure persistence, always scoped to an owner
pub trait BrochureStore {
    fn create(&self, record: BrochureRecord) -> Result<BrochureRecord>;
    fn get(&self, owner: &UserId, id: &str) -> Result<Option<BrochureRecord>>;
    fn update(&self, owner: &UserId, record: BrochureRecord) -> Result<BrochureRecord>;
    fn delete(&self, owner: &UserId, id: &str) -> Result<bool>;
    fn list(&self, owner: &UserId) -> Result<Vec<BrochureRecord>>;
}

/// Object storage for logos and images; returns a public URL
pub trait BlobStore {
    fn upload(&self, bucket: &str, path: &str, bytes: &[u8], content_type: Option<&str>) -> Result<String>;
    fn delete(&self, bucket: &str, path: &str) -> Result<()>;
}

/// What an uploaded file is used for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Logo,
    Image,
}

impl std::str::FromStr for UploadKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "logo" => UploadKind::Logo,
            _ => UploadKind::Image,
        })
    }
}

/// Bucket an upload of `kind` goes to
pub fn bucket_for(kind: UploadKind) -> &'static str {
    match kind {
        UploadKind::Logo => "logos",
        UploadKind::Image => "images",
    }
}

/// Object path for an upload: `{owner}/{timestamp_ms}-{file_name}`
pub fn upload_path(owner: &UserId, timestamp_ms: u64, file_name: &str) -> String {
    format!("{}/{}-{}", owner, timestamp_ms, file_name)
}

/// Process-local [`BrochureStore`], mostly useful for tests and the CLI
#[derive(Debug, Default)]
pub struct InMemoryBrochureStore {
    records: Mutex<HashMap<String, BrochureRecord>>,
}

impl InMemoryBrochureStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, BrochureRecord>>> {
        self.records
            .lock()
            .map_err(|_| Error::Other("brochure store lock poisoned".into()))
    }
}

impl BrochureStore for InMemoryBrochureStore {
    fn create(&self, record: BrochureRecord) -> Result<BrochureRecord> {
        let mut records = self.lock()?;
        if records.contains_key(&record.id) {
            return Err(Error::Other(format!("brochure {} already exists", record.id)));
        }
        records.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn get(&self, owner: &UserId, id: &str) -> Result<Option<BrochureRecord>> {
        Ok(self.lock()?.get(id).filter(|r| &r.owner == owner).cloned())
    }

    fn update(&self, owner: &UserId, record: BrochureRecord) -> Result<BrochureRecord> {
        let mut records = self.lock()?;
        match records.get(&record.id) {
            Some(existing) if &existing.owner == owner && record.owner == *owner => {
                records.insert(record.id.clone(), record.clone());
                Ok(record)
            }
            _ => Err(Error::MissingContent(format!("brochure {} not found", record.id))),
        }
    }

    fn delete(&self, owner: &UserId, id: &str) -> Result<bool> {
        let mut records = self.lock()?;
        if records.get(id).is_some_and(|r| &r.owner == owner) {
            records.remove(id);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn list(&self, owner: &UserId) -> Result<Vec<BrochureRecord>> {
        let mut out: Vec<BrochureRecord> = self
            .lock()?
            .values()
            .filter(|r| &r.owner == owner)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }
}
