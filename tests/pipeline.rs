//! Pipeline, service and remote-variant tests against the in-memory backend.

mod common;

use common::{page_images, solid_document, FakeBackend, BLACK, WHITE};
use parking_lot::Mutex;
use pdfinvert::{
    invert_remote, DirectoryBlobStore, ErrorKind, GridLayout, InvertError, InvertService,
    Pipeline, PipelineConfig, PipelineProgress, PipelineStats, RemoteBlobStore, RemoteId,
    RemoteOp, Scale, SlotAnchor,
};
use std::io::{Cursor, Read};
use std::sync::Arc;

const A: &[u8] = b"%PDF-A";
const B: &[u8] = b"%PDF-B";

/// Page A all white, page B all black, both 40 × 30.
fn white_black_backend() -> FakeBackend {
    FakeBackend::new()
        .with_source(A, solid_document(1, 40, 30, WHITE))
        .with_source(B, solid_document(1, 40, 30, BLACK))
}

fn pipeline(backend: FakeBackend) -> Pipeline<FakeBackend> {
    Pipeline::new(backend, PipelineConfig::default())
}

fn unzip(archive: &[u8]) -> Vec<(String, Vec<u8>)> {
    let mut zip = zip::ZipArchive::new(Cursor::new(archive)).unwrap();
    (0..zip.len())
        .map(|i| {
            let mut entry = zip.by_index(i).unwrap();
            let mut bytes = Vec::new();
            entry.read_to_end(&mut bytes).unwrap();
            (entry.name().to_string(), bytes)
        })
        .collect()
}

/// Backend with a single source of `n` white 20 × 10 pages under `%PDF-n`.
fn n_page_pipeline(n: usize) -> (Pipeline<FakeBackend>, Vec<u8>) {
    let key = format!("%PDF-{n}").into_bytes();
    let backend = FakeBackend::new().with_source(&key, solid_document(n, 20, 10, WHITE));
    (pipeline(backend), key)
}

// ── End-to-end ───────────────────────────────────────────────────────────────

#[test]
fn white_and_black_pages_end_on_one_sheet() {
    let pipeline = pipeline(white_black_backend());
    let output = pipeline.run(&[A.to_vec(), B.to_vec()]).unwrap();

    assert_eq!(output.stats.documents, 2);
    assert_eq!(output.stats.source_pages, 2);
    assert_eq!(output.stats.sheets, 1);

    let sheets = pipeline.backend().written(&output.document);
    assert_eq!(sheets.page_count(), 1);
    let sheet = &sheets.pages()[0];
    assert_eq!((sheet.width(), sheet.height()), (595.0, 842.0));

    let images = page_images(sheet);
    assert_eq!(images.len(), 2, "slot 2 must stay empty");
    let layout = GridLayout::default();
    assert!(layout.slot_rect(0).contains(&images[0].0));
    assert!(layout.slot_rect(1).contains(&images[1].0));
    assert!(images[0].1.is_uniform(BLACK), "inverted white page");
    assert!(images[1].1.is_uniform(WHITE), "inverted black page");

    let labels: Vec<&str> = sheet.labels().map(|l| l.text.as_str()).collect();
    assert_eq!(labels, vec!["Page 1"]);

    let entries = unzip(&output.archive);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].0, "Final_Output.pdf");
    assert_eq!(entries[0].1, output.document);
}

#[test]
fn stage_a_inverts_every_pixel() {
    let pipeline = pipeline(white_black_backend());
    let doc = pipeline.invert_document(A, 0).unwrap();

    assert_eq!(doc.page_count(), 1);
    let page = &doc.pages()[0];
    assert_eq!((page.width(), page.height()), (40.0, 30.0));
    let images = page_images(page);
    assert_eq!(images.len(), 1);
    assert_eq!((images[0].1.width(), images[0].1.height()), (40, 30));
    assert!(images[0].1.is_uniform(BLACK));
}

#[test]
fn invert_and_merge_keeps_submission_order() {
    let backend = FakeBackend::new()
        .with_source(A, solid_document(2, 20, 10, WHITE))
        .with_source(B, solid_document(3, 30, 10, BLACK));
    let pipeline = pipeline(backend);

    let bytes = pipeline.invert_and_merge(&[A.to_vec(), B.to_vec()]).unwrap();
    let merged = pipeline.backend().written(&bytes);

    assert_eq!(merged.page_count(), 5);
    let widths: Vec<f32> = merged.pages().iter().map(|p| p.width()).collect();
    assert_eq!(widths, vec![20.0, 20.0, 30.0, 30.0, 30.0]);
    for (i, page) in merged.pages().iter().enumerate() {
        let expected = if i < 2 { BLACK } else { WHITE };
        assert!(page_images(page)[0].1.is_uniform(expected), "page {i}");
    }
}

#[test]
fn reversed_submission_reverses_pages() {
    let pipeline = pipeline(white_black_backend());
    let output = pipeline.run(&[B.to_vec(), A.to_vec()]).unwrap();
    let sheet = pipeline.backend().written(&output.document).pages()[0].clone();

    let images = page_images(&sheet);
    assert!(images[0].1.is_uniform(WHITE));
    assert!(images[1].1.is_uniform(BLACK));
}

// ── Grid composition ─────────────────────────────────────────────────────────

#[test]
fn sheet_count_is_pages_divided_by_three_rounded_up() {
    for n in 0..=7 {
        let (pipeline, key) = n_page_pipeline(n);
        let output = pipeline.run(&[key]).unwrap();
        let sheets = pipeline.backend().written(&output.document);

        assert_eq!(sheets.page_count(), n.div_ceil(3), "n = {n}");
        assert_eq!(output.stats.sheets, n.div_ceil(3));
        assert_eq!(output.stats.source_pages, n);
    }
}

#[test]
fn single_page_fills_only_slot_zero() {
    let (pipeline, key) = n_page_pipeline(1);
    let output = pipeline.run(&[key]).unwrap();
    let sheets = pipeline.backend().written(&output.document);

    let images = page_images(&sheets.pages()[0]);
    assert_eq!(images.len(), 1);
    let slot0 = GridLayout::default().slot_rect(0);
    assert!(slot0.contains(&images[0].0));
}

#[test]
fn labels_count_sheets_from_one() {
    let (pipeline, key) = n_page_pipeline(8);
    let output = pipeline.run(&[key]).unwrap();
    let sheets = pipeline.backend().written(&output.document);

    let layout = GridLayout::default();
    for (i, sheet) in sheets.pages().iter().enumerate() {
        let labels: Vec<_> = sheet.labels().collect();
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].text, format!("Page {}", i + 1));
        assert_eq!(labels[0].origin, layout.label_origin());
        assert_eq!(labels[0].font_size, 10.0);
        assert_eq!(labels[0].color, BLACK);
    }
    // Partial last sheet: 8 = 3 + 3 + 2.
    assert_eq!(page_images(&sheets.pages()[2]).len(), 2);
}

#[test]
fn slot_rectangles_are_stacked_inside_the_sheet() {
    let layout = GridLayout::default();
    let bounds = layout.page_bounds();
    let slots: Vec<_> = (0..3).map(|j| layout.slot_rect(j)).collect();

    for (j, slot) in slots.iter().enumerate() {
        assert!((slot.height() - (842.0 - 5.0) / 3.0).abs() < 1e-3, "slot {j}");
        assert!(bounds.contains(slot), "slot {j}");
    }
    for pair in slots.windows(2) {
        assert!(!pair[0].overlaps(&pair[1]));
        assert!(pair[0].y1 <= pair[1].y0);
    }

    // Every placed image sits inside its slot and keeps its aspect ratio.
    let (pipeline, key) = n_page_pipeline(6);
    let output = pipeline.run(&[key]).unwrap();
    for sheet in pipeline.backend().written(&output.document).pages() {
        for (j, (rect, _)) in page_images(sheet).iter().enumerate() {
            assert!(slots[j].contains(rect), "image {j} outside its slot");
            assert!((rect.width() / rect.height() - 2.0).abs() < 1e-3);
        }
    }
}

#[test]
fn top_left_anchor_pins_images_to_slot_corner() {
    let config = PipelineConfig::builder()
        .anchor(SlotAnchor::TopLeft)
        .build()
        .unwrap();
    let pipeline = Pipeline::new(white_black_backend(), config);
    let output = pipeline.run(&[A.to_vec(), B.to_vec()]).unwrap();

    let layout = GridLayout::default();
    let sheet = pipeline.backend().written(&output.document).pages()[0].clone();
    for (j, (rect, _)) in page_images(&sheet).iter().enumerate() {
        let slot = layout.slot_rect(j);
        assert_eq!((rect.x0, rect.y0), (slot.x0, slot.y0));
    }
}

#[test]
fn no_inputs_give_an_empty_document_in_a_one_entry_archive() {
    let pipeline = pipeline(FakeBackend::new());
    let output = pipeline.run(&[]).unwrap();

    assert_eq!(output.stats.sheets, 0);
    assert!(pipeline.backend().written(&output.document).is_empty());
    let entries = unzip(&output.archive);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].1, output.document);
}

#[test]
fn custom_entry_name_is_used_in_the_archive() {
    let config = PipelineConfig::builder()
        .archive_entry_name("handout.pdf")
        .build()
        .unwrap();
    let pipeline = Pipeline::new(white_black_backend(), config);
    let output = pipeline.run(&[A.to_vec()]).unwrap();
    assert_eq!(unzip(&output.archive)[0].0, "handout.pdf");
}

// ── Failures ─────────────────────────────────────────────────────────────────

#[test]
fn unreadable_document_fails_the_whole_run() {
    let pipeline = pipeline(white_black_backend());
    let err = pipeline
        .run(&[A.to_vec(), b"%PDF-garbage".to_vec()])
        .unwrap_err();

    assert!(matches!(err, InvertError::CorruptDocument { document: 1, .. }));
    assert_eq!(err.kind(), ErrorKind::Decode);
    // Nothing reached serialisation.
    assert_eq!(pipeline.backend().written_count(), 0);
}

#[test]
fn failed_submission_stores_nothing() {
    let service = InvertService::new(pipeline(white_black_backend()));
    assert!(service.submit_blocking(&[b"%PDF-nope".to_vec()]).is_err());
    assert!(service.store().is_empty());
}

// ── Progress ─────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl PipelineProgress for Recorder {
    fn on_run_start(&self, documents: usize) {
        self.events.lock().push(format!("start {documents}"));
    }
    fn on_document_inverted(&self, index: usize, total: usize, pages: usize) {
        self.events.lock().push(format!("doc {index}/{total} {pages}"));
    }
    fn on_merged(&self, pages: usize) {
        self.events.lock().push(format!("merged {pages}"));
    }
    fn on_sheet_composed(&self, sheet: usize, total: usize) {
        self.events.lock().push(format!("sheet {sheet}/{total}"));
    }
    fn on_run_complete(&self, stats: &PipelineStats) {
        self.events.lock().push(format!("done {}", stats.sheets));
    }
}

#[test]
fn progress_events_follow_the_stages() {
    let recorder = Arc::new(Recorder::default());
    let config = PipelineConfig::builder()
        .progress_callback(recorder.clone() as Arc<dyn PipelineProgress>)
        .build()
        .unwrap();
    let backend = FakeBackend::new()
        .with_source(A, solid_document(2, 20, 10, WHITE))
        .with_source(B, solid_document(2, 20, 10, BLACK));
    Pipeline::new(backend, config)
        .run(&[A.to_vec(), B.to_vec()])
        .unwrap();

    assert_eq!(
        *recorder.events.lock(),
        vec![
            "start 2",
            "doc 1/2 2",
            "doc 2/2 2",
            "merged 4",
            "sheet 1/2",
            "sheet 2/2",
            "done 2",
        ]
    );
}

// ── Service ──────────────────────────────────────────────────────────────────

#[test]
fn submitted_artifacts_are_served_by_id() {
    let service = InvertService::new(pipeline(white_black_backend()));
    let receipt = service.submit_blocking(&[A.to_vec(), B.to_vec()]).unwrap();
    let id = receipt.id.to_string();

    assert_eq!(receipt.document_path, format!("/download/pdf/{id}"));
    assert_eq!(receipt.archive_path, format!("/download/zip/{id}"));

    let document = service.document(&id).unwrap();
    let archive = service.archive(&id).unwrap();
    assert_eq!(document.content_type(), "application/pdf");
    assert_eq!(archive.content_type(), "application/zip");
    assert_eq!(unzip(&archive.bytes)[0].1, document.bytes.to_vec());

    // Repeated reads return the same bytes.
    for _ in 0..3 {
        assert_eq!(service.document(&id).unwrap().bytes, document.bytes);
    }
}

#[test]
fn unknown_or_malformed_ids_are_not_found() {
    let service = InvertService::new(pipeline(white_black_backend()));
    service.submit_blocking(&[A.to_vec()]).unwrap();

    let unknown = pdfinvert::ArtifactId::new().to_string();
    assert!(service.document(&unknown).unwrap_err().is_not_found());
    assert!(service.archive(&unknown).unwrap_err().is_not_found());
    assert_eq!(
        service.document("../etc/passwd").unwrap_err().kind(),
        ErrorKind::NotFound
    );
}

#[tokio::test]
async fn async_submissions_get_distinct_ids() {
    let service = InvertService::new(pipeline(white_black_backend()));

    let (first, second) = tokio::join!(
        service.submit(vec![A.to_vec()]),
        service.submit(vec![B.to_vec(), A.to_vec()]),
    );
    let (first, second) = (first.unwrap(), second.unwrap());

    assert_ne!(first.id, second.id);
    assert_eq!(first.stats.source_pages, 1);
    assert_eq!(second.stats.source_pages, 2);
    assert_eq!(service.store().len(), 2);
}

#[tokio::test]
async fn submit_inputs_reads_local_files() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.pdf");
    let b = dir.path().join("b.pdf");
    std::fs::write(&a, A).unwrap();
    std::fs::write(&b, B).unwrap();

    let service = InvertService::new(pipeline(white_black_backend()));
    let inputs = [a.display().to_string(), b.display().to_string()];
    let receipt = service.submit_inputs(&inputs).await.unwrap();
    assert_eq!(receipt.stats.sheets, 1);

    let missing = [dir.path().join("missing.pdf").display().to_string()];
    let err = service.submit_inputs(&missing).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Input);
}

// ── Remote variant ───────────────────────────────────────────────────────────

#[tokio::test]
async fn remote_document_is_replaced_by_its_inverted_copy() {
    let dir = tempfile::tempdir().unwrap();
    let store = DirectoryBlobStore::new(dir.path());
    let original = store.upload("deck.pdf", A.to_vec(), "inbox").await.unwrap();

    let pipeline = Arc::new(pipeline(white_black_backend()));
    let outcome = invert_remote(Arc::clone(&pipeline), &store, &original, "inverted")
        .await
        .unwrap();

    assert!(outcome.id.as_str().starts_with("inverted/"));
    assert!(outcome.id.as_str().ends_with("-deck.pdf"));
    assert_eq!(outcome.link, store.link(&outcome.id));
    assert!(store.download(&original).await.is_err(), "original must be gone");

    let uploaded = store.download(&outcome.id).await.unwrap();
    let doc = pipeline.backend().written(&uploaded);
    assert_eq!(doc.page_count(), 1);
    assert!(page_images(&doc.pages()[0])[0].1.is_uniform(BLACK));
}

#[tokio::test]
async fn corrupt_remote_document_is_left_alone() {
    let dir = tempfile::tempdir().unwrap();
    let store = DirectoryBlobStore::new(dir.path());
    let original = store
        .upload("junk.pdf", b"%PDF-junk".to_vec(), "inbox")
        .await
        .unwrap();

    let pipeline = Arc::new(pipeline(white_black_backend()));
    let err = invert_remote(pipeline, &store, &original, "inverted")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Decode);
    assert!(store.download(&original).await.is_ok());
    assert!(!dir.path().join("inverted").exists());
}

/// Directory store whose deletes always fail.
struct UndeletableStore(DirectoryBlobStore);

#[async_trait::async_trait]
impl RemoteBlobStore for UndeletableStore {
    async fn upload(&self, name: &str, bytes: Vec<u8>, folder: &str) -> Result<RemoteId, InvertError> {
        self.0.upload(name, bytes, folder).await
    }

    async fn download(&self, id: &RemoteId) -> Result<Vec<u8>, InvertError> {
        self.0.download(id).await
    }

    async fn delete(&self, id: &RemoteId) -> Result<(), InvertError> {
        Err(InvertError::RemoteIo {
            op: RemoteOp::Delete,
            target: id.to_string(),
            detail: "quota exceeded".into(),
        })
    }

    fn link(&self, id: &RemoteId) -> String {
        self.0.link(id)
    }
}

#[tokio::test]
async fn failed_delete_after_upload_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let store = UndeletableStore(DirectoryBlobStore::new(dir.path()));
    let original = store.upload("deck.pdf", B.to_vec(), "").await.unwrap();

    let pipeline = Arc::new(pipeline(white_black_backend()));
    let err = invert_remote(pipeline, &store, &original, "out")
        .await
        .unwrap_err();

    match &err {
        InvertError::RemoteIo { op, target, detail } => {
            assert_eq!(*op, RemoteOp::Delete);
            assert_eq!(target, original.as_str());
            assert!(detail.contains("out/"), "detail should name the upload: {detail}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.kind(), ErrorKind::RemoteIo);
    // The inverted copy stays uploaded next to the original.
    assert_eq!(std::fs::read_dir(dir.path().join("out")).unwrap().count(), 1);
    assert!(store.download(&original).await.is_ok());
}

// ── Configuration ────────────────────────────────────────────────────────────

#[test]
fn configured_password_is_handed_to_the_backend() {
    let config = PipelineConfig::builder().password("s3cret").build().unwrap();
    let configured = Pipeline::new(white_black_backend(), config);
    assert_eq!(configured.backend().password(), Some("s3cret"));

    assert_eq!(pipeline(white_black_backend()).backend().password(), None);
}

#[test]
fn hand_built_config_with_no_slots_is_rejected() {
    let config = PipelineConfig {
        layout: GridLayout {
            slots: 0,
            ..GridLayout::default()
        },
        ..PipelineConfig::default()
    };
    let pipeline = Pipeline::new(white_black_backend(), config);

    let err = pipeline.run(&[A.to_vec(), B.to_vec()]).unwrap_err();
    assert!(matches!(err, InvertError::InvalidConfig(_)), "got {err:?}");
    assert_eq!(err.kind(), ErrorKind::Config);
    assert_eq!(pipeline.backend().written_count(), 0);
}

#[test]
fn scale_applies_to_stage_a_only() {
    let config = PipelineConfig::builder()
        .scale(Scale::uniform(2.0))
        .build()
        .unwrap();
    let backend = FakeBackend::new().with_source(A, solid_document(1, 20, 10, WHITE));
    let pipeline = Pipeline::new(backend, config);

    let inverted = pipeline.invert_document(A, 0).unwrap();
    assert_eq!(inverted.pages()[0].width(), 40.0);

    // The 40 × 20 stage-A page is rasterised once more at one pixel per unit.
    let output = pipeline.run(&[A.to_vec()]).unwrap();
    let sheet = pipeline.backend().written(&output.document).pages()[0].clone();
    let images = page_images(&sheet);
    assert_eq!((images[0].1.width(), images[0].1.height()), (40, 20));
}
