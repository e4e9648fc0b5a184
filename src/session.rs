//! The `alt-text` run: scan, review or generate, write back.
//!
//! ```text
//! dirs ──scan──► references needing a caption
//!                    │
//!                    ├─ none ─────────► "all images have alt text"
//!                    ├─ --check-only ─► listing + summary by dialect
//!                    ▼
//!               model check (fatal on failure)
//!                    │
//!          ┌─────────┴──────────┐
//!        batch             interactive
//! ```
//!
//! References are processed in discovery order, then line order, one at a
//! time. Each file is held as a single [`FileEdit`]. Batch mode writes it
//! once after its last reference; interactive mode writes after every
//! accepted caption, so quitting or an interrupt never loses one.
//!
//! Nothing here prints. Progress goes out as [`CaptionEvent`]s and user
//! answers come in through a [`BufRead`], which keeps both loops testable.

use crate::caption::{
    CaptionSettings, ClientError, PrepareEvent, ScratchDir, VisionClient, check_model,
    generate_caption,
};
use crate::discover::find_files;
use crate::extract::{ExtractOptions, extract_references};
use crate::imaging::ImageBackend;
use crate::mutate::FileEdit;
use crate::resolve::Resolver;
use crate::types::{Dialect, ImageReference, LanguageChoice};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RunError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("vision model unavailable: {0}")]
    ModelUnavailable(#[source] ClientError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Interactive,
    Batch,
}

impl Mode {
    pub fn name(self) -> &'static str {
        match self {
            Mode::Interactive => "interactive",
            Mode::Batch => "batch",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AltTextOptions {
    pub mode: Mode,
    /// Write changes; otherwise only report what would change.
    pub apply: bool,
    pub language: LanguageChoice,
    pub dirs: Vec<PathBuf>,
    pub content_extensions: Vec<String>,
    pub replace_existing: bool,
    pub check_only: bool,
}

/// Progress of an alt-text run, rendered by [`crate::output`].
#[derive(Debug, Clone, PartialEq)]
pub enum CaptionEvent {
    DirectoryMissing(PathBuf),
    FileUnreadable { file: PathBuf, reason: String },
    AllCaptioned,
    CheckOnly {
        references: Vec<ImageReference>,
        replace_existing: bool,
    },
    /// Start of one reference's turn.
    Reviewing {
        index: usize,
        total: usize,
        reference: ImageReference,
        mode: Mode,
    },
    Unresolved { locator: String },
    Generating { model: String },
    Prepared(PrepareEvent),
    Suggested { reference: ImageReference, caption: String },
    GenerationFailed { reason: String },
    /// Prompt text awaiting an answer on the same line.
    Prompt(&'static str),
    Skipped,
    Quit,
    /// Caption applied; `written` is false in dry-run mode.
    Updated { written: bool },
    UpdateFailed { reason: String },
    Finished(RunSummary),
}

/// Batch totals; interactive runs fill them in too.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub mode: Option<Mode>,
    pub processed: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Everything the loops need besides the references.
pub struct Services<'a, B: ImageBackend, C: VisionClient> {
    pub backend: &'a B,
    pub client: &'a C,
    pub scratch: &'a ScratchDir,
    pub resolver: &'a Resolver,
    pub settings: &'a CaptionSettings,
}

/// Every reference needing a caption below `options.dirs`.
///
/// Missing directories and unreadable files are reported and skipped.
pub fn scan(options: &AltTextOptions, emit: &mut impl FnMut(CaptionEvent)) -> Vec<ImageReference> {
    let extract = ExtractOptions {
        language: options.language,
        replace_existing: options.replace_existing,
    };
    let mut references = Vec::new();
    for dir in &options.dirs {
        if !dir.is_dir() {
            emit(CaptionEvent::DirectoryMissing(dir.clone()));
            continue;
        }
        for file in find_files(dir, &options.content_extensions) {
            match fs::read_to_string(&file) {
                Ok(content) => references.extend(extract_references(&file, &content, &extract)),
                Err(e) => emit(CaptionEvent::FileUnreadable {
                    file,
                    reason: e.to_string(),
                }),
            }
        }
    }
    references
}

/// Count references per dialect, in dialect order.
pub fn count_by_dialect(references: &[ImageReference]) -> Vec<(Dialect, usize)> {
    Dialect::ALL
        .into_iter()
        .map(|d| (d, references.iter().filter(|r| r.dialect == d).count()))
        .filter(|(_, count)| *count > 0)
        .collect()
}

/// Run the whole alt-text flow.
pub fn run<B: ImageBackend, C: VisionClient>(
    options: &AltTextOptions,
    services: &Services<'_, B, C>,
    input: &mut impl BufRead,
    emit: &mut impl FnMut(CaptionEvent),
) -> Result<RunSummary, RunError> {
    let references = scan(options, emit);
    if references.is_empty() {
        emit(CaptionEvent::AllCaptioned);
        return Ok(RunSummary::default());
    }
    if options.check_only {
        emit(CaptionEvent::CheckOnly {
            references,
            replace_existing: options.replace_existing,
        });
        return Ok(RunSummary::default());
    }

    check_model(services.client, &services.settings.model).map_err(RunError::ModelUnavailable)?;

    let summary = match options.mode {
        Mode::Batch => run_batch(&references, options.apply, services, emit),
        Mode::Interactive => run_interactive(&references, options.apply, services, input, emit)?,
    };
    emit(CaptionEvent::Finished(summary));
    Ok(summary)
}

/// References grouped by file, keeping discovery order of both files and
/// references.
fn group_by_file(references: &[ImageReference]) -> Vec<(&Path, Vec<(usize, &ImageReference)>)> {
    let mut order: Vec<&Path> = Vec::new();
    let mut groups: BTreeMap<&Path, Vec<(usize, &ImageReference)>> = BTreeMap::new();
    for (index, reference) in references.iter().enumerate() {
        let file = reference.file.as_path();
        if !groups.contains_key(file) {
            order.push(file);
        }
        groups.entry(file).or_default().push((index, reference));
    }
    order
        .into_iter()
        .map(|file| (file, groups.remove(file).unwrap_or_default()))
        .collect()
}

/// Resolve and caption one reference, reporting failures. `None` means the
/// reference was skipped or failed and has been counted.
fn suggest<B: ImageBackend, C: VisionClient>(
    reference: &ImageReference,
    services: &Services<'_, B, C>,
    summary: &mut RunSummary,
    emit: &mut impl FnMut(CaptionEvent),
) -> Option<String> {
    let Some(image) = services.resolver.resolve(&reference.file, &reference.locator) else {
        emit(CaptionEvent::Unresolved {
            locator: reference.locator.clone(),
        });
        summary.skipped += 1;
        return None;
    };
    emit(CaptionEvent::Generating {
        model: services.settings.model.clone(),
    });
    let result = generate_caption(
        services.backend,
        services.client,
        services.scratch,
        &image,
        reference.language,
        services.settings,
        &mut |e| emit(CaptionEvent::Prepared(e)),
    );
    match result {
        Ok(caption) => {
            emit(CaptionEvent::Suggested {
                reference: reference.clone(),
                caption: caption.clone(),
            });
            Some(caption)
        }
        Err(e) => {
            emit(CaptionEvent::GenerationFailed {
                reason: e.to_string(),
            });
            summary.failed += 1;
            None
        }
    }
}

/// Load `file` on first use.
fn ensure_loaded<'e>(edit: &'e mut Option<FileEdit>, file: &Path) -> Result<&'e mut FileEdit, String> {
    if edit.is_none() {
        *edit = Some(FileEdit::load(file).map_err(|e| e.to_string())?);
    }
    edit.as_mut().ok_or_else(|| "file not loaded".to_string())
}

fn run_batch<B: ImageBackend, C: VisionClient>(
    references: &[ImageReference],
    apply: bool,
    services: &Services<'_, B, C>,
    emit: &mut impl FnMut(CaptionEvent),
) -> RunSummary {
    let total = references.len();
    let mut summary = RunSummary {
        mode: Some(Mode::Batch),
        ..RunSummary::default()
    };

    for (file, group) in group_by_file(references) {
        let mut edit: Option<FileEdit> = None;
        let mut pending = 0;
        for (index, reference) in group {
            emit(CaptionEvent::Reviewing {
                index,
                total,
                reference: reference.clone(),
                mode: Mode::Batch,
            });
            let Some(caption) = suggest(reference, services, &mut summary, emit) else {
                continue;
            };
            if !apply {
                emit(CaptionEvent::Updated { written: false });
                summary.processed += 1;
                continue;
            }
            let applied = ensure_loaded(&mut edit, file)
                .and_then(|e| e.apply(reference, &caption).map_err(|e| e.to_string()));
            match applied {
                Ok(()) => {
                    emit(CaptionEvent::Updated { written: true });
                    summary.processed += 1;
                    pending += 1;
                }
                Err(reason) => {
                    emit(CaptionEvent::UpdateFailed { reason });
                    summary.failed += 1;
                }
            }
        }
        if let Some(mut edit) = edit {
            if let Err(e) = edit.save() {
                emit(CaptionEvent::UpdateFailed {
                    reason: e.to_string(),
                });
                summary.processed -= pending;
                summary.failed += pending;
            }
        }
    }
    summary
}

enum Answer {
    Accept,
    Edit,
    Skip,
    Quit,
}

fn read_answer(input: &mut impl BufRead) -> io::Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

fn parse_answer(answer: &str) -> Answer {
    match answer.to_lowercase().as_str() {
        "q" | "quit" => Answer::Quit,
        "s" | "skip" => Answer::Skip,
        "e" | "edit" => Answer::Edit,
        _ => Answer::Accept,
    }
}

fn run_interactive<B: ImageBackend, C: VisionClient>(
    references: &[ImageReference],
    apply: bool,
    services: &Services<'_, B, C>,
    input: &mut impl BufRead,
    emit: &mut impl FnMut(CaptionEvent),
) -> Result<RunSummary, RunError> {
    let total = references.len();
    let mut summary = RunSummary {
        mode: Some(Mode::Interactive),
        ..RunSummary::default()
    };

    for (file, group) in group_by_file(references) {
        let mut edit: Option<FileEdit> = None;
        for (index, reference) in group {
            emit(CaptionEvent::Reviewing {
                index,
                total,
                reference: reference.clone(),
                mode: Mode::Interactive,
            });
            let Some(suggestion) = suggest(reference, services, &mut summary, emit) else {
                continue;
            };

            emit(CaptionEvent::Prompt("Options: [a]ccept, [e]dit, [s]kip, [q]uit: "));
            let answer = match read_answer(input)? {
                Some(answer) => parse_answer(&answer),
                None => Answer::Quit,
            };
            let caption = match answer {
                Answer::Quit => {
                    emit(CaptionEvent::Quit);
                    return Ok(summary);
                }
                Answer::Skip => {
                    emit(CaptionEvent::Skipped);
                    summary.skipped += 1;
                    continue;
                }
                Answer::Accept => suggestion,
                Answer::Edit => {
                    emit(CaptionEvent::Prompt("Edit alt text: "));
                    match read_answer(input)? {
                        Some(edited) if !edited.is_empty() => edited,
                        _ => suggestion,
                    }
                }
            };

            if !apply {
                emit(CaptionEvent::Updated { written: false });
                summary.processed += 1;
                continue;
            }
            let outcome = ensure_loaded(&mut edit, file).and_then(|e| {
                e.apply(reference, &caption)
                    .and_then(|()| e.save())
                    .map_err(|e| e.to_string())
            });
            match outcome {
                Ok(_) => {
                    emit(CaptionEvent::Updated { written: true });
                    summary.processed += 1;
                }
                Err(reason) => {
                    emit(CaptionEvent::UpdateFailed { reason });
                    summary.failed += 1;
                }
            }
        }
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caption::client::tests::MockClient;
    use crate::config::ToolConfig;
    use crate::imaging::backend::tests::MockBackend;
    use crate::test_helpers::setup_fixtures;
    use crate::types::Language;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn options(root: &Path, mode: Mode, apply: bool) -> AltTextOptions {
        AltTextOptions {
            mode,
            apply,
            language: LanguageChoice::Auto,
            dirs: vec![root.join("posts"), root.join("logs")],
            content_extensions: ToolConfig::default().content.extensions,
            replace_existing: false,
            check_only: false,
        }
    }

    fn settings() -> CaptionSettings {
        let mut config = ToolConfig::default();
        // Fixture images are tiny; keep the mock backend out of the way.
        config.images.max_dimension = 0;
        CaptionSettings::from_config(&config)
    }

    struct Harness {
        tmp: TempDir,
        backend: MockBackend,
        scratch: ScratchDir,
        resolver: Resolver,
        settings: CaptionSettings,
    }

    impl Harness {
        fn new() -> Self {
            let tmp = setup_fixtures();
            let resolver = Resolver::new(tmp.path().join("static"));
            Self {
                tmp,
                backend: MockBackend::new(),
                scratch: ScratchDir::create().unwrap(),
                resolver,
                settings: settings(),
            }
        }

        fn run(
            &self,
            options: &AltTextOptions,
            client: &MockClient,
            answers: &str,
        ) -> (Result<RunSummary, RunError>, Vec<CaptionEvent>) {
            let services = Services {
                backend: &self.backend,
                client,
                scratch: &self.scratch,
                resolver: &self.resolver,
                settings: &self.settings,
            };
            let mut events = Vec::new();
            let mut input = Cursor::new(answers.as_bytes().to_vec());
            let result = run(options, &services, &mut input, &mut |e| events.push(e));
            (result, events)
        }

        fn read(&self, rel: &str) -> String {
            fs::read_to_string(self.tmp.path().join(rel)).unwrap()
        }
    }

    fn ok(captions: &[&str]) -> Vec<Result<String, ClientError>> {
        captions.iter().map(|c| Ok(c.to_string())).collect()
    }

    #[test]
    fn scan_finds_fixture_references_in_order() {
        let h = Harness::new();
        let mut events = Vec::new();
        let refs = scan(&options(h.tmp.path(), Mode::Batch, false), &mut |e| events.push(e));
        let locators: Vec<&str> = refs.iter().map(|r| r.locator.as_str()).collect();
        assert_eq!(
            locators,
            vec![
                "./files/cathedrale.png",
                "./files/nef.png",
                "./files/vitrail.png",
                "./images/field.png",
                "/icons/logo.svg",
                "./gate.jpg",
                "https://example.com/remote.jpg",
            ]
        );
        assert!(events.is_empty());
        let amiens = refs.iter().find(|r| r.locator == "./files/nef.png").unwrap();
        assert_eq!(amiens.language, Language::Fr);
    }

    #[test]
    fn batch_dry_run_counts_without_writing() {
        let h = Harness::new();
        let before = h.read("posts/amiens/amiens.md");
        let client = MockClient::new(ok(&["A", "B", "C", "D", "E"]));

        let (result, events) = h.run(&options(h.tmp.path(), Mode::Batch, false), &client, "");
        let summary = result.unwrap();

        // gate.jpg is missing and the remote URL never resolves.
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.processed, 5);
        assert_eq!(summary.failed, 0);
        assert_eq!(h.read("posts/amiens/amiens.md"), before);
        assert!(events.contains(&CaptionEvent::Updated { written: false }));
        assert!(matches!(events.last(), Some(CaptionEvent::Finished(_))));
    }

    #[test]
    fn batch_apply_writes_every_caption_of_a_file() {
        let h = Harness::new();
        let client = MockClient::new(ok(&[
            "La cathédrale",
            "La nef",
            "Un vitrail \"bleu\"",
            "A green field",
            "A round logo",
        ]));

        let (result, _) = h.run(&options(h.tmp.path(), Mode::Batch, true), &client, "");
        assert_eq!(result.unwrap().processed, 5);

        let amiens = h.read("posts/amiens/amiens.md");
        assert!(amiens.contains("![La cathédrale](./files/cathedrale.png)"));
        assert!(amiens.contains("colSpan: 2, alt: \"La nef\" },"));
        assert!(amiens.contains("<img src=\"./files/vitrail.png\" alt=\"Un vitrail &quot;bleu&quot;\" class=\"rounded\">"));
        // Existing caption untouched.
        assert!(amiens.contains("alt: \"L'un des vitraux du chœur\""));

        let hello = h.read("posts/hello/hello.md");
        assert!(hello.contains("src={imageModules['./images/field.png']} alt=\"A green field\" />"));
        assert!(hello.contains("<img src=\"/icons/logo.svg\" alt=\"A round logo\">"));

        // French prompts for the French post.
        let languages: Vec<Language> = client.get_requests().iter().map(|r| r.1).collect();
        assert_eq!(
            languages,
            vec![Language::Fr, Language::Fr, Language::Fr, Language::En, Language::En]
        );
    }

    #[test]
    fn batch_failures_are_counted_and_skipped() {
        let h = Harness::new();
        let client = MockClient::new(vec![
            Ok("La cathédrale".into()),
            Err(ClientError::Endpoint("out of memory".into())),
            Ok("   ".into()),
            Ok("A green field".into()),
            Ok("A round logo".into()),
        ]);

        let (result, events) = h.run(&options(h.tmp.path(), Mode::Batch, true), &client, "");
        let summary = result.unwrap();
        assert_eq!((summary.processed, summary.failed, summary.skipped), (3, 2, 2));
        assert!(events.iter().any(|e| matches!(
            e,
            CaptionEvent::GenerationFailed { reason } if reason.contains("out of memory")
        )));
        let amiens = h.read("posts/amiens/amiens.md");
        assert!(amiens.contains("![La cathédrale]"));
        assert!(amiens.contains("alt: \"\" },"));
    }

    #[test]
    fn interactive_accept_edit_skip_quit() {
        let h = Harness::new();
        let client = MockClient::new(ok(&[
            "Suggestion 1",
            "Suggestion 2",
            "Suggestion 3",
            "Suggestion 4",
            "Suggestion 5",
        ]));
        let mut opts = options(h.tmp.path(), Mode::Interactive, true);
        opts.dirs = vec![h.tmp.path().join("posts")];

        // cathedrale: accept; nef: edit to custom text; vitrail: skip;
        // field: edit with empty input keeps suggestion; logo: quit.
        let answers = "a\ne\nLa nef, vue du transept\ns\ne\n\nq\n";
        let (result, events) = h.run(&opts, &client, answers);
        let summary = result.unwrap();
        assert_eq!((summary.processed, summary.skipped), (3, 1));

        let amiens = h.read("posts/amiens/amiens.md");
        assert!(amiens.contains("![Suggestion 1](./files/cathedrale.png)"));
        assert!(amiens.contains("alt: \"La nef, vue du transept\" },"));
        assert!(amiens.contains("alt=\"image\""));
        let hello = h.read("posts/hello/hello.md");
        assert!(hello.contains("alt=\"Suggestion 4\" />"));
        // Everything accepted before quitting is already on disk.
        assert!(hello.contains("<img src=\"/icons/logo.svg\" alt=\"\">"));
        assert!(events.contains(&CaptionEvent::Quit));
    }

    #[test]
    fn interactive_end_of_input_quits() {
        let h = Harness::new();
        let client = MockClient::new(ok(&["x"]));
        let opts = options(h.tmp.path(), Mode::Interactive, true);
        let before = h.read("posts/amiens/amiens.md");

        let (result, events) = h.run(&opts, &client, "");
        assert_eq!(result.unwrap().processed, 0);
        assert!(events.contains(&CaptionEvent::Quit));
        assert_eq!(h.read("posts/amiens/amiens.md"), before);
    }

    #[test]
    fn check_only_never_calls_the_model() {
        let h = Harness::new();
        let client = MockClient::new(vec![]).with_models(&[]);
        let mut opts = options(h.tmp.path(), Mode::Batch, true);
        opts.check_only = true;

        let (result, events) = h.run(&opts, &client, "");
        assert!(result.is_ok());
        assert!(client.get_requests().is_empty());
        let Some(CaptionEvent::CheckOnly { references, .. }) = events.last() else {
            panic!("expected check-only listing, got {events:?}");
        };
        assert_eq!(
            count_by_dialect(references),
            vec![
                (Dialect::MarkdownInline, 3),
                (Dialect::HtmlTag, 2),
                (Dialect::EnhancedComponent, 1),
                (Dialect::GridObject, 1),
            ]
        );
    }

    #[test]
    fn missing_model_is_fatal() {
        let h = Harness::new();
        let client = MockClient::new(ok(&["x"])).with_models(&["moondream:latest"]);
        let (result, _) = h.run(&options(h.tmp.path(), Mode::Batch, true), &client, "");
        assert!(matches!(
            result,
            Err(RunError::ModelUnavailable(ClientError::ModelMissing(_)))
        ));
        assert!(client.get_requests().is_empty());
    }

    #[test]
    fn nothing_to_do_short_circuits() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("posts")).unwrap();
        fs::write(tmp.path().join("posts/a.md"), "![A dog](./dog.jpg)\n").unwrap();
        let h = Harness::new();
        let client = MockClient::new(vec![]).with_models(&[]);

        let mut opts = options(tmp.path(), Mode::Batch, true);
        opts.dirs = vec![tmp.path().join("posts"), tmp.path().join("missing")];
        let (result, events) = h.run(&opts, &client, "");
        assert!(result.is_ok());
        assert_eq!(
            events,
            vec![
                CaptionEvent::DirectoryMissing(tmp.path().join("missing")),
                CaptionEvent::AllCaptioned,
            ]
        );
    }

    #[test]
    fn grouping_keeps_discovery_order() {
        let reference = |file: &str, line: usize| ImageReference {
            file: PathBuf::from(file),
            locator: "./a.jpg".into(),
            caption: String::new(),
            line_number: line,
            line_content: String::new(),
            dialect: Dialect::MarkdownInline,
            occurrence: 0,
            language: Language::En,
        };
        let refs = vec![reference("/z.md", 1), reference("/z.md", 4), reference("/a.md", 2)];
        let groups = group_by_file(&refs);
        assert_eq!(groups[0].0, Path::new("/z.md"));
        assert_eq!(groups[0].1.len(), 2);
        assert_eq!(groups[1].1[0].0, 2);
    }
}
