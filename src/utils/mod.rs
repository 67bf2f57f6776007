use std::path::PathBuf;

const APP_FOLDER_NAME: &str = "eduquest";

/// 应用数据目录：优先系统本地数据目录，其次用户主目录，最后是程序所在目录
pub fn get_app_data_dir() -> PathBuf {
    if let Some(dir) = dirs::data_local_dir() {
        return dir.join(APP_FOLDER_NAME);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(format!(".{}", APP_FOLDER_NAME));
    }

    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|p| p.join("data")))
        .unwrap_or_else(|| PathBuf::from("data"))
}

pub fn get_database_path() -> PathBuf {
    let mut path = get_app_data_dir();
    path.push("eduquest.db");
    path
}

pub fn get_log_path() -> PathBuf {
    let mut path = get_app_data_dir();
    path.push("eduquest.log");
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_live_under_local_data_dir() {
        let base = dirs::data_local_dir().unwrap().join("eduquest");

        assert_eq!(get_app_data_dir(), base);
        assert!(get_database_path().is_absolute());
        assert_eq!(get_database_path(), base.join("eduquest.db"));
        assert_eq!(get_log_path(), base.join("eduquest.log"));
    }
}
