//! Settings and agent store for the NexusVoice dashboard.
//!
//! Implements the persistence behind the dashboard: key-value settings
//! (API keys, webhook URLs, telephony credentials) and CRUD for agents,
//! folders, phone numbers, cloned voices, and connected CRM accounts.
//!
//! All operations take a plain `rusqlite::Connection`; callers check one
//! out of the [`nexus_db`] pool. Writes are last-write-wins single
//! statements — the dashboard is a single-operator tool and needs no
//! transactional guarantees beyond that.
//!
//! Cross-entity rules live here rather than in the API layer:
//! deleting an agent releases its number assignments, deleting a folder
//! detaches its agents, and assigning a number moves it off the previous
//! agent.

mod agents;
mod error;
mod numbers;
mod settings;
mod voices;


pub use agents::{
    delete_agent, delete_folder, get_agent, list_agents, list_folders, rename_folder, save_agent,
    save_folder,
};
pub use error::StoreError;
pub use numbers::{
    assign_number_to_agent, get_number, list_numbers, merge_provider_numbers, save_number,
    unassign_number,
};
pub use settings::{
    delete_setting, get_setting, get_telephony_credentials, set_setting,
    set_telephony_credentials, SettingKey,
};
pub use voices::{
    delete_account, get_account, list_accounts, list_custom_voices, save_account,
    save_custom_voice,
};
