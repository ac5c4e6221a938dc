//! Server state and configuration.

use image::RgbaImage;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::data::Rows;
use crate::export::ExportHandle;
use crate::render::FontBook;
use crate::template::Template;

/// How long a finished export task (and its PDF) is kept around.
pub const TASK_EXPIRATION_SECS: i64 = 3600;

/// Viewport padding used when mapping editor coordinates.
pub const EDITOR_PADDING: f32 = 20.0;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on (e.g., "127.0.0.1:5000")
    pub listen_addr: String,
    /// Directory where export PDFs are written
    pub work_dir: PathBuf,
    /// Maximum request body size for uploads, in bytes
    pub upload_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:5000".to_string(),
            work_dir: std::env::temp_dir().join("badgeforge"),
            upload_limit: 16 * 1024 * 1024,
        }
    }
}

/// The editing session: one template, one data set, one background.
#[derive(Debug, Default)]
pub struct Session {
    pub template: Template,
    pub rows: Rows,
    /// Decoded background at template size, shared with export workers.
    pub background: Option<Arc<RgbaImage>>,
    pub background_filename: Option<String>,
    pub rows_filename: Option<String>,
}

/// Application state shared across handlers.
pub struct AppState {
    pub config: ServerConfig,
    pub session: RwLock<Session>,
    /// Export tasks by id.
    pub tasks: RwLock<HashMap<String, ExportHandle>>,
    pub fonts: Arc<FontBook>,
}

impl AppState {
    pub fn new(config: ServerConfig, fonts: FontBook) -> Self {
        Self {
            config,
            session: RwLock::new(Session::default()),
            tasks: RwLock::new(HashMap::new()),
            fonts: Arc::new(fonts),
        }
    }
}
