use std::path::PathBuf;

use crate::db::Database;
use crate::error::{Error, Result};
use crate::settings::{load_settings, save_settings, shellexpand_path};

pub fn run(data_dir: Option<String>, account_codes: Option<String>) -> Result<()> {
    let mut settings = load_settings();
    if let Some(dir) = data_dir {
        settings.data_dir = shellexpand_path(&dir);
    }
    if let Some(codes) = account_codes {
        regex::Regex::new(&codes).map_err(|e| Error::InvalidArgument(e.to_string()))?;
        settings.account_codes = codes;
    }

    let dir = PathBuf::from(&settings.data_dir);
    std::fs::create_dir_all(&dir)?;
    let db_path = settings.db_path();
    Database::open(&db_path)?;
    save_settings(&settings)?;

    println!("Initialized {}", db_path.display());
    println!("Donation account codes: {}", settings.account_codes);
    Ok(())
}
