use std::path::PathBuf;

pub fn get_root_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("storyforge")
}

/// Get the path of the persisted credit balance
pub fn get_ledger_path() -> PathBuf {
    get_root_data_dir().join("credits.json")
}

/// Default directory for text exports
pub fn get_export_dir() -> PathBuf {
    dirs::document_dir()
        .unwrap_or_else(get_root_data_dir)
        .join("storyforge")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_lives_in_the_data_dir() {
        assert!(get_ledger_path().starts_with(get_root_data_dir()));
        assert_eq!(get_ledger_path().file_name().unwrap(), "credits.json");
    }
}
