use std::path::Path;

use crate::errors::ClientError;

/// Raw-text résumés must fall inside this range (characters, after trimming).
pub const MIN_RESUME_CHARS: usize = 20;
pub const MAX_RESUME_CHARS: usize = 1000;

const PDF_SIGNATURE: &[u8] = b"%PDF-";

/// A résumé as submitted by the user: an uploaded PDF or free text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeInput {
    Pdf { file_name: String, bytes: Vec<u8> },
    Text(String),
}

impl ResumeInput {
    /// Reads a PDF from disk, keeping its file name for the upload part.
    pub async fn from_pdf_path(path: &Path) -> Result<Self, ClientError> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("resume.pdf")
            .to_string();
        Ok(ResumeInput::Pdf { file_name, bytes })
    }

    /// Rejects input the backend would refuse. Runs before any state change.
    pub fn validate(&self) -> Result<(), ClientError> {
        match self {
            ResumeInput::Pdf { file_name, bytes } => {
                if bytes.is_empty() {
                    return Err(ClientError::Validation(format!("{file_name} is empty")));
                }
                if !bytes.starts_with(PDF_SIGNATURE) {
                    return Err(ClientError::Validation(format!(
                        "{file_name} is not a PDF file"
                    )));
                }
                Ok(())
            }
            ResumeInput::Text(text) => {
                let chars = text.trim().chars().count();
                if chars < MIN_RESUME_CHARS {
                    return Err(ClientError::Validation(format!(
                        "resume text must be at least {MIN_RESUME_CHARS} characters (got {chars})"
                    )));
                }
                if chars > MAX_RESUME_CHARS {
                    return Err(ClientError::Validation(format!(
                        "resume text must be at most {MAX_RESUME_CHARS} characters (got {chars})"
                    )));
                }
                Ok(())
            }
        }
    }

    /// "pdf" or "text", for logs.
    pub fn mode(&self) -> &'static str {
        match self {
            ResumeInput::Pdf { .. } => "pdf",
            ResumeInput::Text(_) => "text",
        }
    }
}
