//! User settings for shafu

mod settings;

pub use settings::{CONFIG_FILE_NAMES, InitScriptSettings, Settings, TimingSettings};
