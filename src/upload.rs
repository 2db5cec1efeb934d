use std::path::Path;

use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{FinwiseError, Result};
use crate::extractor::StatementExtractor;
use crate::models::{FileType, UploadHistoryItem};
use crate::session::SessionContext;
use crate::store::{doc_path, DocumentStore, SetOptions};

pub fn uploads_collection(uid: &str) -> String {
    doc_path(&["users", uid, "uploads"])
}

/// Extract a statement for the signed-in user and record it in their upload history.
pub fn upload_statement(
    session: &SessionContext,
    extractor: &dyn StatementExtractor,
    path: &Path,
) -> Result<UploadHistoryItem> {
    let user = session.require_user()?;
    let services = session.require_services()?;

    let file_type = FileType::from_path(path).ok_or_else(|| {
        FinwiseError::UnsupportedFile(format!("{} (expected .pdf or .csv)", path.display()))
    })?;
    if !path.is_file() {
        return Err(FinwiseError::NotFound(path.display().to_string()));
    }
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();

    let transactions = extractor.extract(path, file_type).inspect_err(|e| {
        log::error!("Extraction of {file_name} failed: {e}");
    })?;

    let item = UploadHistoryItem {
        id: Uuid::new_v4().to_string(),
        user_id: user.uid.clone(),
        file_name,
        upload_date: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        file_type,
        transaction_count: transactions.len(),
        transactions,
    };

    let path = doc_path(&[&uploads_collection(&user.uid), &item.id]);
    services
        .store
        .set(&path, serde_json::to_value(&item)?, SetOptions::default())
        .inspect_err(|e| log::error!("Could not save upload {}: {e}", item.id))?;
    log::info!(
        "Recorded upload {} ({} transactions)",
        item.file_name,
        item.transaction_count
    );
    Ok(item)
}

/// Upload history, newest first. Unreadable documents are skipped.
pub fn list_uploads(store: &dyn DocumentStore, uid: &str) -> Result<Vec<UploadHistoryItem>> {
    let mut items: Vec<UploadHistoryItem> = store
        .list(&uploads_collection(uid))?
        .into_iter()
        .filter_map(|(id, data)| decode(&id, data))
        .collect();
    items.sort_by(|a, b| b.upload_date.cmp(&a.upload_date));
    Ok(items)
}

pub fn get_upload(store: &dyn DocumentStore, uid: &str, id: &str) -> Result<UploadHistoryItem> {
    let path = doc_path(&[&uploads_collection(uid), id]);
    let data = store
        .get(&path)?
        .ok_or_else(|| FinwiseError::NotFound(format!("upload {id}")))?;
    Ok(serde_json::from_value(data)?)
}

fn decode(id: &str, data: Value) -> Option<UploadHistoryItem> {
    match serde_json::from_value(data) {
        Ok(item) => Some(item),
        Err(e) => {
            log::warn!("Skipping unreadable upload {id}: {e}");
            None
        }
    }
}
