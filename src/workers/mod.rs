//! # Workers Module
//!
//! Tâches de fond lancées au démarrage du serveur:
//! - `cleanup_worker.rs`: suppression périodique des vieux codes de réinitialisation
//!
//! Chaque worker tourne dans sa propre tâche tokio, en boucle, et journalise
//! ses erreurs sans s'arrêter.

pub mod cleanup_worker;

pub use cleanup_worker::{CleanupConfig, CleanupWorker};
