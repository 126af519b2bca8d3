//! Command implementations.
//!
//! Every command writes its user-facing output to the `out` writer it is
//! given; diagnostics go through `tracing`.

pub mod shell;

use anyhow::{bail, Context as _, Result};
use std::io::{Read, Write};
use std::path::PathBuf;
use tracing::info;

use crate::cli::{
    Commands, DirsCommands, FilterArgs, LlmCommands, PathCommands, PrefCommands, ScopeArgs,
    ValueCommands,
};
use crate::config::Config;
use crate::db::{locate, ImageDatabase};
use crate::error::PreferenceError;
use crate::export::{open_in_browser, write_gallery, write_records, ExportFormat};
use crate::llm::settings::resolve_llm_settings;
use crate::llm::{apply_llm_settings, LlmClient, LlmOverrides, Transformation};
use crate::prefs::settings::{self, canonical_language};
use crate::prefs::{
    FolderLocator, PreferenceStore, Resolver, Scope, Session, SqlitePreferenceStore, SystemFolders,
    ValueSource,
};
use crate::scanner::{describe_images, ImageFilter, ImageRecord, Scanner};

pub use shell::run_shell;

/// Everything a command needs besides its arguments and the session.
pub struct Context {
    pub config: Config,
    pub store: SqlitePreferenceStore,
    pub folders: Box<dyn FolderLocator>,
    /// Set inside `aimeta shell`, where stdin carries command lines.
    pub interactive: bool,
}

impl Context {
    /// `preferences_db` overrides the store location from the config file.
    pub fn new(config: Config, preferences_db: Option<PathBuf>) -> Self {
        let store_path = preferences_db.unwrap_or_else(|| config.preferences_path.clone());
        Self {
            config,
            store: SqlitePreferenceStore::new(store_path),
            folders: Box::new(SystemFolders),
            interactive: false,
        }
    }

    pub fn resolver<'a>(&'a self, session: &'a mut Session) -> Resolver<'a> {
        Resolver::new(&self.store, session)
    }

    fn scanner(&self, no_recurse: bool) -> Scanner {
        let scanner = Scanner::new(&self.config.scanner);
        if no_recurse {
            scanner.with_recurse(false)
        } else {
            scanner
        }
    }

    fn image_directories(
        &self,
        session: &mut Session,
        explicit: &[PathBuf],
        scope: Scope,
    ) -> Vec<PathBuf> {
        let mut resolver = self.resolver(session);
        let folders = self.folders.as_ref();
        let resolved = settings::image_directories(&mut resolver, folders, explicit, scope);
        info!("Image directories from {}: {:?}", resolved.source, resolved.value);
        resolved.value
    }

    fn image_database(
        &self,
        session: &mut Session,
        explicit: Option<PathBuf>,
        scope: Scope,
    ) -> PathBuf {
        let mut resolver = self.resolver(session);
        let folders = self.folders.as_ref();
        settings::image_database_path(&mut resolver, folders, explicit.as_deref(), scope).value
    }

    fn llm_client(
        &self,
        session: &mut Session,
        overrides: &LlmOverrides,
        scope: Scope,
    ) -> LlmClient {
        let mut resolver = self.resolver(session);
        let resolved = resolve_llm_settings(&mut resolver, &self.config.llm, overrides, scope);
        info!(
            "Using model {} at {}",
            resolved.settings.model, resolved.settings.endpoint
        );
        LlmClient::from_settings(&resolved.settings)
    }
}

/// Runs one parsed command against `session`.
pub fn run(
    command: Commands,
    ctx: &Context,
    session: &mut Session,
    out: &mut dyn Write,
) -> Result<()> {
    match command {
        Commands::Language { command } => language(ctx, session, command, out),
        Commands::ImageDirs { command } => image_dirs(ctx, session, command, out),
        Commands::FacesDir { command } => {
            path_preference(ctx, session, PathPreference::Faces, command, out)
        }
        Commands::ImageDb { command } => {
            path_preference(ctx, session, PathPreference::Database, command, out)
        }
        Commands::Pref { command } => pref(ctx, session, command, out),
        Commands::Llm { command } => llm(ctx, session, command, out),
        Commands::Transform {
            kind,
            text,
            instructions,
            language,
            llm,
            scope,
        } => transform(ctx, session, kind, text, instructions, language, &llm, scope, out),
        Commands::DescribeImages {
            dirs,
            only_new,
            language,
            no_recurse,
            llm,
            scope,
        } => {
            let scope = scope.scope()?;
            let language = resolve_language(ctx, session, language.as_deref(), scope)?;
            let dirs = ctx.image_directories(session, &dirs, scope);
            let client = ctx.llm_client(session, &llm, scope);
            let scanner = ctx.scanner(no_recurse);

            let summary = describe_images(&scanner, &client, &dirs, &language, only_new);
            writeln!(
                out,
                "Described {} images, skipped {}, failed {}",
                summary.described,
                summary.skipped,
                summary.failed.len()
            )?;
            for (path, error) in &summary.failed {
                writeln!(out, "  {}: {}", path.display(), error)?;
            }
            Ok(())
        }
        Commands::FindImages {
            filter,
            dirs,
            no_recurse,
            passthru,
            format,
            output,
            no_open,
            scope,
        } => {
            let scope = scope.scope()?;
            let filter = build_filter(&filter)?;
            let dirs = ctx.image_directories(session, &dirs, scope);
            let records = ctx.scanner(no_recurse).scan(&dirs, &filter);

            if passthru {
                emit_records(&records, format, output, out)
            } else {
                gallery(ctx, &records, &filter, output, no_open, out)
            }
        }
        Commands::Index {
            dirs,
            no_recurse,
            image_db,
            scope,
        } => {
            let scope = scope.scope()?;
            let primary = ctx.image_database(session, image_db, scope);
            let dirs = ctx.image_directories(session, &dirs, scope);
            let records = ctx.scanner(no_recurse).scan(&dirs, &ImageFilter::default());

            let mut db = ImageDatabase::open(&locate(&primary))?;
            let count = db.replace_all(&records)?;
            writeln!(out, "Indexed {} images into {}", count, db.path().display())?;
            Ok(())
        }
        Commands::SearchIndex {
            filter,
            format,
            image_db,
            scope,
        } => {
            let scope = scope.scope()?;
            let filter = build_filter(&filter)?;
            let primary = ctx.image_database(session, image_db, scope);
            let db = ImageDatabase::open_existing(&primary)?;
            let records = db.search(&filter)?;
            write_records(&records, format, out)
        }
        Commands::Stats { image_db, json, scope } => {
            let primary = ctx.image_database(session, image_db, scope.scope()?);
            let stats = ImageDatabase::open_existing(&primary)?.stats()?;
            if json {
                serde_json::to_writer_pretty(&mut *out, &stats)?;
                writeln!(out)?;
            } else {
                writeln!(out, "Database:          {}", stats.path.display())?;
                writeln!(out, "Size:              {}", format_size(stats.size_bytes))?;
                writeln!(out, "Images:            {}", stats.images)?;
                writeln!(out, "Described:         {}", stats.described)?;
                writeln!(out, "Distinct keywords: {}", stats.distinct_keywords)?;
                writeln!(out, "Distinct people:   {}", stats.distinct_people)?;
            }
            Ok(())
        }
        Commands::Shell => bail!("already running inside the aimeta shell"),
    }
}

fn resolve_language(
    ctx: &Context,
    session: &mut Session,
    explicit: Option<&str>,
    scope: Scope,
) -> Result<String> {
    let mut resolver = ctx.resolver(session);
    let resolved = settings::language(&mut resolver, explicit, scope);
    match canonical_language(&resolved.value) {
        Some(language) => Ok(language.to_string()),
        None => Err(PreferenceError::UnsupportedLanguage(resolved.value).into()),
    }
}

fn language(
    ctx: &Context,
    session: &mut Session,
    command: ValueCommands,
    out: &mut dyn Write,
) -> Result<()> {
    match command {
        ValueCommands::Get { value, scope } => {
            let mut resolver = ctx.resolver(session);
            let resolved = settings::language(&mut resolver, value.as_deref(), scope.scope()?);
            writeln!(out, "{}", resolved.value)?;
        }
        ValueCommands::Set { value, scope } => {
            let mut resolver = ctx.resolver(session);
            settings::set_language(&mut resolver, value.as_deref(), scope.scope()?)?;
        }
    }
    Ok(())
}

fn image_dirs(
    ctx: &Context,
    session: &mut Session,
    command: DirsCommands,
    out: &mut dyn Write,
) -> Result<()> {
    match command {
        DirsCommands::Get { dirs, scope } => {
            for dir in ctx.image_directories(session, &dirs, scope.scope()?) {
                writeln!(out, "{}", dir.display())?;
            }
        }
        DirsCommands::Set { dirs, scope } => {
            let scope = scope.scope()?;
            if dirs.is_empty() && scope != Scope::ClearSession {
                return Err(PreferenceError::MissingValue {
                    parameter: settings::IMAGE_DIRECTORIES.to_string(),
                }
                .into());
            }
            let mut resolver = ctx.resolver(session);
            settings::set_image_directories(&mut resolver, &dirs, scope)?;
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy)]
enum PathPreference {
    Faces,
    Database,
}

fn path_preference(
    ctx: &Context,
    session: &mut Session,
    which: PathPreference,
    command: PathCommands,
    out: &mut dyn Write,
) -> Result<()> {
    let folders = ctx.folders.as_ref();
    match command {
        PathCommands::Get { path, scope } => {
            let mut resolver = ctx.resolver(session);
            let scope = scope.scope()?;
            let resolved = match which {
                PathPreference::Faces => {
                    settings::faces_directory(&mut resolver, folders, path.as_deref(), scope)
                }
                PathPreference::Database => {
                    settings::image_database_path(&mut resolver, folders, path.as_deref(), scope)
                }
            };
            writeln!(out, "{}", resolved.value.display())?;
        }
        PathCommands::Set { path, scope } => {
            let mut resolver = ctx.resolver(session);
            let scope = scope.scope()?;
            match which {
                PathPreference::Faces => {
                    settings::set_faces_directory(&mut resolver, path.as_deref(), scope)?
                }
                PathPreference::Database => {
                    settings::set_image_database_path(&mut resolver, path.as_deref(), scope)?
                }
            }
        }
    }
    Ok(())
}

fn pref(
    ctx: &Context,
    session: &mut Session,
    command: PrefCommands,
    out: &mut dyn Write,
) -> Result<()> {
    match command {
        PrefCommands::Get { name, value, scope } => {
            let mut resolver = ctx.resolver(session);
            if let Some(found) = resolver.lookup(&name, value.as_deref(), scope.scope()?) {
                writeln!(out, "{}", found.value)?;
            }
        }
        PrefCommands::Set { name, value, scope } => {
            let mut resolver = ctx.resolver(session);
            resolver.apply(&name, value.as_deref(), scope.scope()?)?;
        }
        PrefCommands::List => {
            let stored = ctx.store.entries().with_context(|| {
                format!("failed to read preferences from {}", ctx.store.path().display())
            })?;
            for (name, value) in stored {
                let source = if session.get(&name).is_some() {
                    "preferences, overridden in session"
                } else {
                    "preferences"
                };
                writeln!(out, "{} = {} ({})", name, value, source)?;
            }
            for (name, value) in session.iter() {
                writeln!(out, "{} = {} ({})", name, value, ValueSource::Session)?;
            }
        }
    }
    Ok(())
}

fn llm(
    ctx: &Context,
    session: &mut Session,
    command: LlmCommands,
    out: &mut dyn Write,
) -> Result<()> {
    match command {
        LlmCommands::Show { llm, scope } => {
            let mut resolver = ctx.resolver(session);
            let resolved =
                resolve_llm_settings(&mut resolver, &ctx.config.llm, &llm, scope.scope()?);
            let s = &resolved.settings;
            let show = |v: Option<String>| v.unwrap_or_else(|| "(unset)".to_string());
            let values = [
                s.model.clone(),
                s.endpoint.clone(),
                if s.api_key.is_some() { "(set)".to_string() } else { "(unset)".to_string() },
                s.temperature.to_string(),
                s.max_tokens.to_string(),
                show(s.gpu.map(|v| v.to_string())),
                show(s.cpu.map(|v| v.to_string())),
                s.timeout_secs.to_string(),
            ];
            for ((name, source), value) in resolved.sources.iter().zip(values) {
                writeln!(out, "{:<16} {} ({})", name, value, source)?;
            }
        }
        LlmCommands::Set { llm, scope } => {
            let mut resolver = ctx.resolver(session);
            apply_llm_settings(&mut resolver, &llm, scope.scope()?)?;
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn transform(
    ctx: &Context,
    session: &mut Session,
    kind: Transformation,
    text: Vec<String>,
    instructions: Option<String>,
    language: Option<String>,
    llm: &LlmOverrides,
    scope: ScopeArgs,
    out: &mut dyn Write,
) -> Result<()> {
    let scope = scope.scope()?;
    let no_instructions = instructions.as_deref().map_or(true, |i| i.trim().is_empty());
    if kind == Transformation::Custom && no_instructions {
        bail!("`custom` needs --instructions");
    }

    let text = if !text.is_empty() {
        text.join(" ")
    } else if ctx.interactive {
        bail!("no text given; stdin is not read inside the shell");
    } else {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    };
    if text.trim().is_empty() {
        return Err(PreferenceError::MissingValue {
            parameter: "Text".to_string(),
        }
        .into());
    }

    let language = resolve_language(ctx, session, language.as_deref(), scope)?;
    let prompt = kind.instructions(&language, instructions.as_deref());
    let client = ctx.llm_client(session, llm, scope);

    let result = client.transform_text(&prompt, &text)?;
    writeln!(out, "{}", result)?;
    Ok(())
}

fn build_filter(args: &FilterArgs) -> Result<ImageFilter> {
    ImageFilter::new(&args.keywords, &args.people)
}

fn emit_records(
    records: &[ImageRecord],
    format: ExportFormat,
    output: Option<PathBuf>,
    out: &mut dyn Write,
) -> Result<()> {
    match output {
        Some(path) => {
            let file = std::fs::File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            write_records(records, format, std::io::BufWriter::new(file))?;
            info!("Wrote {} records to {}", records.len(), path.display());
            Ok(())
        }
        None => write_records(records, format, out),
    }
}

fn gallery(
    ctx: &Context,
    records: &[ImageRecord],
    filter: &ImageFilter,
    output: Option<PathBuf>,
    no_open: bool,
    out: &mut dyn Write,
) -> Result<()> {
    let path = output
        .or_else(|| ctx.config.gallery.output_path.clone())
        .unwrap_or_else(|| std::env::temp_dir().join("aimeta-gallery.html"));

    let title = if filter.is_empty() {
        "Images".to_string()
    } else {
        format!("Images matching {}", filter)
    };
    write_gallery(records, &title, &path)?;
    writeln!(out, "{} images written to {}", records.len(), path.display())?;

    if !no_open {
        open_in_browser(&path, ctx.config.gallery.browser.as_deref())?;
    }
    Ok(())
}

/// Format file size for display
fn format_size(bytes: u64) -> String {
    if bytes >= 1_073_741_824 {
        format!("{:.2} GB", bytes as f64 / 1_073_741_824.0)
    } else if bytes >= 1_048_576 {
        format!("{:.2} MB", bytes as f64 / 1_048_576.0)
    } else if bytes >= 1024 {
        format!("{:.2} KB", bytes as f64 / 1024.0)
    } else {
        format!("{} bytes", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use crate::prefs::KnownFolder;
    use crate::sidecar::{sidecar_path, SidecarKind};
    use clap::Parser;
    use std::fs;
    use std::path::Path;
    use tempfile::{tempdir, TempDir};

    struct HomeFolders(PathBuf);

    impl FolderLocator for HomeFolders {
        fn locate(&self, folder: KnownFolder) -> anyhow::Result<PathBuf> {
            Ok(self.0.join(folder.literal_name()))
        }

        fn home(&self) -> PathBuf {
            self.0.clone()
        }
    }

    fn context(dir: &TempDir) -> Context {
        let mut config = Config::default();
        config.preferences_path = dir.path().join("prefs.db");
        config.gallery.output_path = Some(dir.path().join("gallery.html"));
        let mut ctx = Context::new(config, None);
        ctx.folders = Box::new(HomeFolders(dir.path().to_path_buf()));
        ctx
    }

    fn exec(ctx: &Context, session: &mut Session, args: &[&str]) -> Result<String> {
        let cli = Cli::try_parse_from(std::iter::once("aimeta").chain(args.iter().copied()))?;
        let mut out = Vec::new();
        run(cli.command, ctx, session, &mut out)?;
        Ok(String::from_utf8(out)?)
    }

    fn touch_image(dir: &Path, name: &str, description: &str) -> PathBuf {
        let image = dir.join(name);
        fs::write(&image, b"jpeg").unwrap();
        fs::write(sidecar_path(&image, SidecarKind::Description), description).unwrap();
        image
    }

    #[test]
    fn test_language_set_then_get() {
        let dir = tempdir().unwrap();
        let ctx = context(&dir);
        let mut session = Session::new();

        assert_eq!(exec(&ctx, &mut session, &["language", "get"]).unwrap(), "English\n");
        exec(&ctx, &mut session, &["language", "set", "french"]).unwrap();
        assert_eq!(exec(&ctx, &mut session, &["language", "get"]).unwrap(), "French\n");

        // explicit wins
        assert_eq!(exec(&ctx, &mut session, &["language", "get", "Dutch"]).unwrap(), "Dutch\n");
    }

    #[test]
    fn test_session_only_then_clear_session() {
        let dir = tempdir().unwrap();
        let ctx = context(&dir);
        let mut session = Session::new();

        exec(&ctx, &mut session, &["language", "set", "German"]).unwrap();
        exec(&ctx, &mut session, &["language", "set", "Spanish", "--session-only"]).unwrap();
        assert_eq!(exec(&ctx, &mut session, &["language", "get"]).unwrap(), "Spanish\n");
        assert_eq!(
            exec(&ctx, &mut session, &["language", "get", "--skip-session"]).unwrap(),
            "German\n"
        );

        exec(&ctx, &mut session, &["language", "set", "--clear-session"]).unwrap();
        assert_eq!(exec(&ctx, &mut session, &["language", "get"]).unwrap(), "German\n");
    }

    #[test]
    fn test_set_without_value_names_parameter() {
        let dir = tempdir().unwrap();
        let ctx = context(&dir);
        let mut session = Session::new();

        let err = exec(&ctx, &mut session, &["pref", "set", "FacesDirectory"]).unwrap_err();
        assert!(err.to_string().contains("FacesDirectory"));

        let err = exec(&ctx, &mut session, &["image-dirs", "set"]).unwrap_err();
        assert!(err.to_string().contains("ImageDirectories"));
    }

    #[test]
    fn test_conflicting_scope_is_rejected() {
        let dir = tempdir().unwrap();
        let ctx = context(&dir);
        let mut session = Session::new();

        let args = ["language", "get", "--session-only", "--skip-session"];
        let err = exec(&ctx, &mut session, &args).unwrap_err();
        assert!(err.to_string().contains("cannot be combined"));
    }

    #[test]
    fn test_image_dirs_default_and_set() {
        let dir = tempdir().unwrap();
        let ctx = context(&dir);
        let mut session = Session::new();

        let defaults = exec(&ctx, &mut session, &["image-dirs", "get"]).unwrap();
        assert_eq!(defaults.lines().count(), 4);
        assert!(defaults.lines().next().unwrap().ends_with("Pictures"));

        let a = dir.path().join("photos/a");
        exec(&ctx, &mut session, &["image-dirs", "set", a.to_str().unwrap()]).unwrap();
        assert!(a.is_dir());
        assert_eq!(
            exec(&ctx, &mut session, &["image-dirs", "get"]).unwrap(),
            format!("{}\n", a.display())
        );
    }

    #[test]
    fn test_pref_list_marks_session_values() {
        let dir = tempdir().unwrap();
        let ctx = context(&dir);
        let mut session = Session::new();

        exec(&ctx, &mut session, &["pref", "set", "LLMModel", "gemma"]).unwrap();
        exec(&ctx, &mut session, &["pref", "set", "LLMCpu", "4", "--session-only"]).unwrap();

        let listing = exec(&ctx, &mut session, &["pref", "list"]).unwrap();
        assert!(listing.contains("LLMModel = gemma (preferences, overridden in session)"));
        assert!(listing.contains("LLMCpu = 4 (session)"));
    }

    #[test]
    fn test_llm_show_reports_sources() {
        let dir = tempdir().unwrap();
        let ctx = context(&dir);
        let mut session = Session::new();

        exec(&ctx, &mut session, &["llm", "set", "--model", "gemma-3-4b", "--gpu", "-1"]).unwrap();
        let shown = exec(&ctx, &mut session, &["llm", "show", "--skip-session"]).unwrap();

        assert!(shown.contains("gemma-3-4b (preferences)"));
        assert!(shown.contains("http://127.0.0.1:1234/v1 (default)"));
        assert!(shown.contains("LLMApiKey        (unset) (default)"));
        assert!(shown.contains("LLMGpu           -1 (preferences)"));
    }

    #[test]
    fn test_find_images_passthru_json() {
        let dir = tempdir().unwrap();
        let ctx = context(&dir);
        let mut session = Session::new();
        let pics = dir.path().join("pics");
        fs::create_dir_all(&pics).unwrap();
        touch_image(&pics, "a.jpg", r#"{"keywords":["sunset","beach"]}"#);
        touch_image(&pics, "b.jpg", r#"{"keywords":["forest"]}"#);

        let output = exec(
            &ctx,
            &mut session,
            &["find-images", "-k", "*beach*", "--dir", pics.to_str().unwrap(), "--passthru"],
        )
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(value.as_array().unwrap().len(), 1);
        assert_eq!(value[0]["keywords"], serde_json::json!(["sunset", "beach"]));
    }

    #[test]
    fn test_find_images_gallery_without_opening() {
        let dir = tempdir().unwrap();
        let ctx = context(&dir);
        let mut session = Session::new();
        let pics = dir.path().join("pics");
        fs::create_dir_all(&pics).unwrap();
        touch_image(&pics, "a.jpg", r#"{"short_description":"A cat","keywords":["cat"]}"#);

        let output = exec(
            &ctx,
            &mut session,
            &["find-images", "--dir", pics.to_str().unwrap(), "--no-open"],
        )
        .unwrap();

        assert!(output.starts_with("1 images written to"));
        let html = fs::read_to_string(dir.path().join("gallery.html")).unwrap();
        assert!(html.contains("A cat"));
    }

    #[test]
    fn test_index_search_and_stats() {
        let dir = tempdir().unwrap();
        let ctx = context(&dir);
        let mut session = Session::new();
        let pics = dir.path().join("pics");
        fs::create_dir_all(&pics).unwrap();
        touch_image(&pics, "a.jpg", r#"{"keywords":["cat","dog"]}"#);
        touch_image(&pics, "b.jpg", r#"{"keywords":["fish"]}"#);
        let db = dir.path().join("index/allimages.meta.db");
        let db_arg = db.to_str().unwrap();

        let indexed = exec(
            &ctx,
            &mut session,
            &["index", "--dir", pics.to_str().unwrap(), "--image-db", db_arg],
        )
        .unwrap();
        assert!(indexed.starts_with("Indexed 2 images"));

        let found = exec(
            &ctx,
            &mut session,
            &["search-index", "-k", "c*t", "--format", "csv", "--image-db", db_arg],
        )
        .unwrap();
        assert_eq!(found.lines().count(), 2);
        assert!(found.contains("a.jpg"));

        let stats = exec(&ctx, &mut session, &["stats", "--image-db", db_arg]).unwrap();
        assert!(stats.contains("Images:            2"));
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 bytes");
        assert_eq!(format_size(2048), "2.00 KB");
        assert_eq!(format_size(3 * 1_048_576), "3.00 MB");
    }
}
