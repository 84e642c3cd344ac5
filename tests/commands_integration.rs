use std::path::PathBuf;

use photo_uploader::app::App;
use photo_uploader::commands::{SetArgs, SyncArgs, build_settings, handle_set, handle_sync};
use photo_uploader::config::Config;
use photo_uploader::remote::{LocalLibrary, PhotosApi};

fn app_in(dir: &tempfile::TempDir) -> App {
    App::init_at(dir.path().join("config.json")).unwrap()
}

#[test]
fn flags_override_config() {
    let cfg = Config {
        name_substitutions: "_, ".into(),
        max_concurrency: 2,
        capitalize: false,
        ..Config::default()
    };
    let args = SyncArgs {
        concurrency: Some(8),
        capitalize: true,
        no_parse_year: true,
        ..SyncArgs::default()
    };
    let s = build_settings(&cfg, &args).unwrap();
    assert_eq!(s.max_concurrency, 8);
    assert!(s.capitalize);
    assert!(!s.parse_year);
    assert_eq!(s.substitutions.apply("a_b"), "a b");

    let args = SyncArgs { substitutions: Some("-,+".into()), ..SyncArgs::default() };
    let s = build_settings(&cfg, &args).unwrap();
    assert_eq!(s.substitutions.apply("a_b-c"), "a_b+c");
    assert_eq!(s.max_concurrency, 2);
}

#[test]
fn bad_flags_are_rejected() {
    let cfg = Config::default();
    let zero = SyncArgs { concurrency: Some(0), ..SyncArgs::default() };
    assert!(build_settings(&cfg, &zero).is_err());
    let odd = SyncArgs { substitutions: Some("a,b,c".into()), ..SyncArgs::default() };
    assert!(build_settings(&cfg, &odd).is_err());
}

#[test]
fn set_updates_and_persists_config() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = app_in(&dir);
    let args = SetArgs {
        library_path: Some(PathBuf::from("/tmp/elsewhere")),
        extensions: Some("JPG, .png".into()),
        substitutions: Some("_, ".into()),
        concurrency: Some(3),
        capitalize: Some(true),
        ..SetArgs::default()
    };
    handle_set(&mut app, args).unwrap();

    let reloaded = app_in(&dir);
    let c = reloaded.get_config();
    assert_eq!(c.library_path, PathBuf::from("/tmp/elsewhere"));
    assert_eq!(c.extensions, vec!["jpg", "png"]);
    assert_eq!(c.name_substitutions, "_, ");
    assert_eq!(c.max_concurrency, 3);
    assert!(c.capitalize);
    assert!(c.parse_year);
}

#[test]
fn set_rejects_invalid_values_without_saving() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = app_in(&dir);
    let before = app.get_config().clone();
    assert!(handle_set(&mut app, SetArgs { concurrency: Some(0), ..SetArgs::default() }).is_err());
    assert!(handle_set(&mut app, SetArgs { substitutions: Some("x".into()), ..SetArgs::default() }).is_err());
    assert_eq!(app_in(&dir).get_config(), &before);
}

#[test]
fn sync_command_fills_the_configured_library() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = app_in(&dir);
    handle_set(
        &mut app,
        SetArgs { substitutions: Some("_, ".into()), rewrite_dates: Some(false), ..SetArgs::default() },
    )
    .unwrap();

    let photos = tempfile::tempdir().unwrap();
    let album = photos.path().join("Beach_2012");
    std::fs::create_dir(&album).unwrap();
    std::fs::write(album.join("one.jpg"), b"one").unwrap();
    std::fs::write(album.join("two.jpg"), b"two").unwrap();

    let args = SyncArgs { dir: photos.path().to_path_buf(), skip_confirmation: true, ..SyncArgs::default() };
    handle_sync(&app, args.clone()).unwrap();

    let lib = LocalLibrary::open(&app.get_config().library_path).unwrap();
    let albums = lib.list_albums().unwrap();
    assert_eq!(albums.len(), 1);
    assert_eq!(albums[0].title, "Beach 2012");
    assert_eq!(lib.album_items(&albums[0].id).unwrap(), vec!["one.jpg", "two.jpg"]);

    // second run finds the album and leaves it alone
    handle_sync(&app, args).unwrap();
    assert_eq!(lib.list_albums().unwrap().len(), 1);
    assert_eq!(lib.album_items(&albums[0].id).unwrap().len(), 2);
}

#[test]
fn sync_command_rejects_missing_dir() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = app_in(&dir);
    handle_set(&mut app, SetArgs { rewrite_dates: Some(false), ..SetArgs::default() }).unwrap();
    let args = SyncArgs { dir: dir.path().join("missing"), skip_confirmation: true, ..SyncArgs::default() };
    let err = handle_sync(&app, args).unwrap_err();
    assert!(err.to_string().contains("does not exist"), "{err:#}");
}
