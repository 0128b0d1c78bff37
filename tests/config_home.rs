mod support;

use std::path::PathBuf;

use pointsdesk::app_dirs::APP_DIR_NAME;
use pointsdesk::config::{self, AppSettings, CONFIG_FILE_NAME, DEFAULT_DB_FILE_NAME};
use support::pointsdesk_env::PointsdeskEnvGuard;

#[test]
fn config_lives_under_overridden_home() {
    let temp = tempfile::tempdir().expect("create tempdir");
    let _env = PointsdeskEnvGuard::set_config_home(temp.path().to_path_buf());

    let path = config::config_path().expect("config path");
    assert_eq!(path, temp.path().join(APP_DIR_NAME).join(CONFIG_FILE_NAME));

    let defaults = config::load_or_default().expect("defaults");
    assert_eq!(defaults.actor_name, "admin");
    assert_eq!(
        config::resolve_database_path(&defaults).expect("db path"),
        temp.path().join(APP_DIR_NAME).join(DEFAULT_DB_FILE_NAME)
    );
}

#[test]
fn saved_settings_load_back() {
    let temp = tempfile::tempdir().expect("create tempdir");
    let _env = PointsdeskEnvGuard::set_config_home(temp.path().to_path_buf());

    let mut settings = AppSettings {
        roster_sheet_path: Some(PathBuf::from("/srv/school/roster.xlsx")),
        actor_name: "office".into(),
        ..AppSettings::default()
    };
    settings.export.interval_sec = 1.0;
    settings.history.max_actions = 20;
    config::save(&settings).expect("save");

    let loaded = config::load_or_default().expect("load");
    assert_eq!(loaded.roster_sheet_path, settings.roster_sheet_path);
    assert_eq!(loaded.actor_name, "office");
    assert_eq!(loaded.export.interval_sec, 5.0);
    assert_eq!(loaded.history.max_actions, 20);
}
