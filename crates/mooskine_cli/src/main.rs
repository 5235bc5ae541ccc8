//! CLI smoke entry point.
//!
//! # Responsibility
//! - Open a Mooskine store from an optional JSON config and print its
//!   notebooks with note counts.
//! - Exit the process when the store cannot be opened.

use mooskine_core::{
    core_version, init_logging_from_config, NotebookService, StoreConfig, StoreHandle,
};

fn main() {
    let config = match std::env::args().nth(1) {
        Some(path) => match StoreConfig::from_file(&path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("mooskine_cli: {err}");
                std::process::exit(2);
            }
        },
        None => StoreConfig::default(),
    };

    if let Err(err) = init_logging_from_config(&config) {
        eprintln!("mooskine_cli: logging disabled: {err}");
    }

    println!("mooskine_core version={}", core_version());
    let store = StoreHandle::open_or_exit(&config);
    let notebooks = NotebookService::new(store.main_context().clone());
    match notebooks.list_notebooks() {
        Ok(summaries) => {
            println!("notebooks={}", summaries.len());
            for summary in summaries {
                println!(
                    "{}\t{}\tnotes={}",
                    summary.notebook.id(),
                    summary.notebook.name(),
                    summary.note_count
                );
            }
        }
        Err(err) => {
            eprintln!("mooskine_cli: cannot list notebooks: {err}");
            std::process::exit(1);
        }
    }
}
