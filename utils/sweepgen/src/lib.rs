mod config;
mod matrix;
mod patch;
mod script;

pub use config::{LongSettings, SettingsError, SweepSettings};
pub use matrix::{Configuration, Delay, DelayParseError, TimeUnit, default_matrix, long_delay};
pub use patch::{
    CLK_FREQ_PATTERN, DELAY_PATTERN, PatchError, Patched, clk_freq_declaration,
    delay_declaration, patch_file, patch_source,
};
pub use script::{group_thousands, render_preview, render_script, write_script};
