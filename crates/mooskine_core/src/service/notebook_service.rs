//! Notebook list use cases.

use crate::model::notebook::{Notebook, NotebookId};
use crate::service::action::{ActionError, ActionResult, UserAction};
use crate::store::{ObjectContext, StoreError, StoreResult};
use log::info;

/// A notebook row with its note count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotebookSummary {
    pub notebook: Notebook,
    pub note_count: usize,
}

/// Notebook list facade over the main context.
pub struct NotebookService {
    context: ObjectContext,
}

impl NotebookService {
    pub fn new(context: ObjectContext) -> Self {
        Self { context }
    }

    /// Creates and saves a notebook. Names are trimmed and must be non-empty.
    pub fn add_notebook(&self, name: &str) -> ActionResult<Notebook> {
        let action = UserAction::AddNotebook;
        let name = name.trim();
        if name.is_empty() {
            return Err(ActionError::new(
                action,
                StoreError::InvalidInput("notebook name cannot be empty".to_string()),
            ));
        }
        let notebook = self
            .context
            .insert_notebook(name)
            .map_err(|err| ActionError::new(action, err))?;
        self.save(action)?;
        info!("event=notebook_add module=service status=ok");
        Ok(notebook)
    }

    /// Deletes a notebook together with its notes and saves.
    pub fn delete_notebook(&self, id: NotebookId) -> ActionResult<()> {
        let action = UserAction::DeleteNotebook;
        self.context
            .delete_notebook(id)
            .map_err(|err| ActionError::new(action, err))?;
        self.save(action)?;
        info!("event=notebook_delete module=service status=ok");
        Ok(())
    }

    /// Lists notebooks newest first, with note counts.
    pub fn list_notebooks(&self) -> StoreResult<Vec<NotebookSummary>> {
        self.context
            .fetch_notebooks()?
            .into_iter()
            .map(|notebook| {
                let note_count = self.context.count_notes(notebook.id())?;
                Ok(NotebookSummary {
                    notebook,
                    note_count,
                })
            })
            .collect()
    }

    fn save(&self, action: UserAction) -> ActionResult<()> {
        self.context
            .save()
            .map(|_| ())
            .map_err(|err| ActionError::new(action, err))
    }
}
