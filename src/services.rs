use std::cell::OnceCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use rusqlite::Connection;

use crate::auth::{AuthProvider, LocalAuth};
use crate::config::BackendConfig;
use crate::db::{get_connection, init_db};
use crate::error::{FinwiseError, Result};
use crate::store::{DocumentStore, LocalStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionContext {
    /// Interactive client: the only context where backend handles exist.
    Client,
    /// Pre-rendering, batch jobs and anything else without a user at the keyboard.
    #[allow(dead_code)]
    Server,
}

/// The backend application handle: configuration plus the open database.
pub struct BackendApp {
    config: BackendConfig,
    db_path: PathBuf,
    conn: Rc<Connection>,
}

impl BackendApp {
    pub fn open(config: BackendConfig, data_dir: &Path) -> Result<Self> {
        let project_id = config
            .project_id
            .clone()
            .ok_or(FinwiseError::ServicesUnavailable)?;
        std::fs::create_dir_all(data_dir)?;
        let db_path = data_dir.join(format!("{project_id}.db"));
        let conn = get_connection(&db_path)?;
        init_db(&conn)?;
        Ok(Self {
            config,
            db_path,
            conn: Rc::new(conn),
        })
    }

    pub fn project_id(&self) -> &str {
        self.config.project_id.as_deref().unwrap_or_default()
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn connection(&self) -> Rc<Connection> {
        Rc::clone(&self.conn)
    }
}

#[derive(Clone)]
pub struct ServiceHandles {
    pub app: Rc<BackendApp>,
    pub auth: Rc<dyn AuthProvider>,
    pub store: Rc<dyn DocumentStore>,
}

impl ServiceHandles {
    pub fn local(app: BackendApp) -> Self {
        let conn = app.connection();
        Self {
            auth: Rc::new(LocalAuth::new(Rc::clone(&conn))),
            store: Rc::new(LocalStore::new(conn)),
            app: Rc::new(app),
        }
    }
}

pub struct ServiceInitializer {
    config: BackendConfig,
    context: ExecutionContext,
    data_dir: PathBuf,
    handles: OnceCell<Option<ServiceHandles>>,
}

impl ServiceInitializer {
    pub fn new(config: BackendConfig, context: ExecutionContext, data_dir: PathBuf) -> Self {
        Self {
            config,
            context,
            data_dir,
            handles: OnceCell::new(),
        }
    }

    /// Handles for the configured backend, or `None` when unavailable.
    ///
    /// Unavailable means: not a client context, API key or project id missing,
    /// or the backend could not be opened. None of these is an error for the
    /// caller. Repeated calls return the same instances.
    pub fn initialize(&self) -> Option<ServiceHandles> {
        if self.context != ExecutionContext::Client {
            return None;
        }
        if !self.config.is_complete() {
            log::debug!("backend config incomplete; services unavailable");
            return None;
        }
        self.handles.get_or_init(|| self.connect()).clone()
    }

    fn connect(&self) -> Option<ServiceHandles> {
        match BackendApp::open(self.config.clone(), &self.data_dir) {
            Ok(app) => {
                log::debug!("opened backend {}", app.db_path().display());
                Some(ServiceHandles::local(app))
            }
            Err(e) => {
                log::error!("Could not open backend: {e}");
                None
            }
        }
    }
}
