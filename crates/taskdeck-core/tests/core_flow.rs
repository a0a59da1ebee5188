use std::sync::Arc;

use taskdeck_core::color_scheme::MediaQuery;
use taskdeck_core::document::{DARK_CLASS, DocumentRoot, LANG_ATTRIBUTE, MemoryDocument};
use taskdeck_core::locale::SupportedLocale;
use taskdeck_core::storage::{FileStorage, KeyValueStorage, TOKEN_STORAGE_KEY};
use taskdeck_core::{AppState, Host};
use taskdeck_shared::{
    NotificationPatch, Settings, SettingsPatch, SortField, SortOrder, TaskCreate, TaskFilter,
    TaskPriority, TaskSorting, ThemePreference,
};
use tempfile::tempdir;

fn file_host(dir: &std::path::Path, prefers_dark: bool) -> (Host, Arc<MemoryDocument>, Arc<MediaQuery>) {
    let document = Arc::new(MemoryDocument::new());
    let query = Arc::new(MediaQuery::new(prefers_dark));
    let host = Host {
        storage: Arc::new(FileStorage::open(dir).expect("open storage")),
        document: document.clone(),
        color_scheme: query.clone(),
        system_locale: Some("en".to_string()),
    };
    (host, document, query)
}

#[test]
fn ids_are_never_reused_after_delete() {
    let mut state = AppState::new(Host::in_memory());

    assert_eq!(state.tasks.add(TaskCreate::new("a")), Some(1));
    assert_eq!(state.tasks.add(TaskCreate::new("b")), Some(2));
    assert!(state.tasks.delete(1));
    assert_eq!(state.tasks.add(TaskCreate::new("c")), Some(3));

    assert!(state.tasks.delete(3));
    assert_eq!(state.tasks.add(TaskCreate::new("d")), Some(4));
}

#[test]
fn derived_view_filters_sorts_and_memoizes() {
    let mut state = AppState::new(Host::in_memory());
    let tasks = &mut state.tasks;

    let mut low = TaskCreate::new("Write report");
    low.tags = vec!["work".into()];
    low.position = 2;
    tasks.add(low);

    let mut high = TaskCreate::new("water plants");
    high.priority = TaskPriority::High;
    high.tags = vec!["home".into()];
    high.position = 1;
    tasks.add(high);

    let mut other_low = TaskCreate::new("Review PR");
    other_low.tags = vec!["work".into(), "review".into()];
    other_low.position = 0;
    tasks.add(other_low);

    tasks.set_filter(TaskFilter {
        priority: Some(TaskPriority::Low),
        tags: Some(vec!["work".into()]),
        ..TaskFilter::default()
    });
    let first = tasks.filtered_tasks();
    let titles: Vec<&str> = first.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, ["Review PR", "Write report"]);

    let again = tasks.filtered_tasks();
    assert!(Arc::ptr_eq(&first, &again));
    assert_eq!(tasks.recompute_count(), 1);

    tasks.set_sorting(TaskSorting {
        field: SortField::Title,
        order: SortOrder::Desc,
    });
    let resorted = tasks.filtered_tasks();
    let titles: Vec<&str> = resorted.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, ["Write report", "Review PR"]);
    assert_eq!(tasks.recompute_count(), 2);

    tasks.set_filter(TaskFilter {
        search: Some("WATER".into()),
        ..TaskFilter::default()
    });
    let searched = tasks.filtered_tasks();
    assert_eq!(searched.len(), 1);
    assert_eq!(searched[0].title, "water plants");
}

#[test]
fn settings_survive_a_restart_and_drive_the_theme() {
    let temp = tempdir().expect("tempdir");

    {
        let (host, document, _query) = file_host(temp.path(), false);
        let state = AppState::new(host);
        assert!(!document.has_class(DARK_CLASS));

        state.settings.update(SettingsPatch {
            theme: Some(ThemePreference::Dark),
            ..SettingsPatch::default()
        });
        state.settings.update_notifications(NotificationPatch {
            reminder_time: Some(10),
            ..NotificationPatch::default()
        });
        assert!(document.has_class(DARK_CLASS));
    }

    let (host, document, query) = file_host(temp.path(), false);
    let state = AppState::new(host);
    let settings = state.settings.settings();
    assert_eq!(settings.theme, ThemePreference::Dark);
    assert_eq!(settings.notifications.reminder_time, 10);
    assert_eq!(settings.language, Settings::default().language);
    assert!(document.has_class(DARK_CLASS));

    state.settings.update(SettingsPatch {
        theme: Some(ThemePreference::System),
        ..SettingsPatch::default()
    });
    assert!(!document.has_class(DARK_CLASS));
    query.set_prefers_dark(true);
    assert!(document.has_class(DARK_CLASS));

    state.settings.reset();
    drop(state);

    let (host, _document, _query) = file_host(temp.path(), false);
    assert_eq!(AppState::new(host).settings.settings(), Settings::default());
}

#[test]
fn restored_token_without_user_then_logout() {
    let temp = tempdir().expect("tempdir");
    FileStorage::open(temp.path())
        .expect("open storage")
        .set_item(TOKEN_STORAGE_KEY, "abc")
        .expect("seed token");

    let (host, _document, _query) = file_host(temp.path(), false);
    let storage = Arc::clone(&host.storage);
    let mut state = AppState::new(host);
    assert_eq!(state.session.token(), Some("abc"));
    assert!(!state.session.is_authenticated());

    state.session.logout();
    assert_eq!(state.session.token(), None);
    assert_eq!(storage.get_item(TOKEN_STORAGE_KEY).expect("get"), None);
}

#[test]
fn locale_prefers_storage_over_system() {
    let temp = tempdir().expect("tempdir");

    let (host, document, _query) = file_host(temp.path(), false);
    let mut state = AppState::new(host);
    assert_eq!(state.locale.locale(), SupportedLocale::En);

    state.locale.set_locale(SupportedLocale::ZhCn);
    assert_eq!(document.attribute(LANG_ATTRIBUTE).as_deref(), Some("zh-CN"));
    drop(state);

    let (host, _document, _query) = file_host(temp.path(), false);
    assert_eq!(AppState::new(host).locale.locale(), SupportedLocale::ZhCn);
}
