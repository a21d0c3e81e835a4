//! Upload-and-analyze flow
//!
//! Image in, machine row out: preview as a data URL, ask the analyze function
//! what it is, store the answer.

use std::path::Path;

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::{error, info};

use super::Notices;
use crate::client::{ClientError, FunctionsApi};
use crate::db::{Machine, MachineStore, NewMachine};
use crate::exercises::MachineGuess;
use crate::muscles::normalize_muscles;

const FAILURE_MESSAGE: &str = "Failed to analyze machine. Please try again.";

/// MIME type from the file extension
pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "heic" => "image/heic",
        "heif" => "image/heif",
        "avif" => "image/avif",
        "tif" | "tiff" => "image/tiff",
        _ => "application/octet-stream",
    }
}

/// A file picked or dropped by the user
#[derive(Debug, Clone)]
pub struct ImageFile {
    pub name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl ImageFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        let mime = mime_for_path(Path::new(&name)).to_string();
        Self { name, mime, bytes }
    }

    pub fn read(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).with_context(|| format!("cannot read {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            name,
            mime: mime_for_path(path).to_string(),
            bytes,
        })
    }

    pub fn is_image(&self) -> bool {
        self.mime.starts_with("image/")
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, STANDARD.encode(&self.bytes))
    }
}

#[derive(Debug, Default)]
pub struct UploadForm {
    /// Data URL of the accepted image
    pub preview: Option<String>,
    pub busy: bool,
    pub notices: Notices,
}

impl UploadForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept a picked file for preview. Non-images are rejected untouched.
    pub fn select(&mut self, file: &ImageFile) -> bool {
        if !file.is_image() {
            self.notices.error("Please upload an image file");
            return false;
        }
        self.preview = Some(file.to_data_url());
        true
    }

    /// Analyze the image and store the machine. `None` means a notice explains why.
    pub async fn submit<S, F>(&mut self, file: &ImageFile, store: &S, api: &F) -> Option<Machine>
    where
        S: MachineStore,
        F: FunctionsApi,
    {
        let image_url = self.begin(file)?;
        let result = api.analyze_machine(&image_url).await;
        self.finish(&file.name, &image_url, result, store)
    }

    /// Validate and lock the form. Returns the data URL to analyze, or
    /// `None` if the file was rejected or an upload is already running.
    pub fn begin(&mut self, file: &ImageFile) -> Option<String> {
        if self.busy || !self.select(file) {
            return None;
        }
        self.busy = true;
        self.preview.clone()
    }

    /// Store the analysis result and unlock the form
    pub fn finish<S: MachineStore>(
        &mut self,
        file_name: &str,
        image_url: &str,
        analysis: Result<MachineGuess, ClientError>,
        store: &S,
    ) -> Option<Machine> {
        self.busy = false;
        let result = analysis
            .map_err(anyhow::Error::from)
            .and_then(|guess| Self::insert(image_url, &guess, store));

        match result {
            Ok(machine) => {
                info!("stored machine {} ({})", machine.id, machine.name);
                self.notices.success(format!("Machine identified: {}", machine.name));
                Some(machine)
            }
            Err(e) => {
                error!("upload of {} failed: {:#}", file_name, e);
                self.notices.error(FAILURE_MESSAGE);
                None
            }
        }
    }

    fn insert<S: MachineStore>(image_url: &str, guess: &MachineGuess, store: &S) -> Result<Machine> {
        store.insert_machine(&NewMachine {
            name: guess.name.trim().to_string(),
            muscles: normalize_muscles(&guess.muscles),
            image_url: Some(image_url.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, MachineUpdate};
    use crate::exercises::{ExercisePlan, GenerateRequest};
    use std::cell::Cell;

    struct FakeApi {
        calls: Cell<usize>,
        fail: bool,
    }

    impl FakeApi {
        fn new(fail: bool) -> Self {
            Self {
                calls: Cell::new(0),
                fail,
            }
        }
    }

    impl FunctionsApi for FakeApi {
        async fn analyze_machine(&self, image_data_url: &str) -> Result<MachineGuess, ClientError> {
            self.calls.set(self.calls.get() + 1);
            assert!(image_data_url.starts_with("data:image/png;base64,"));
            if self.fail {
                return Err(ClientError::Endpoint {
                    status: 429,
                    message: "Rate limit exceeded. Please try again later.".into(),
                });
            }
            Ok(MachineGuess {
                name: "Cable Row".into(),
                muscles: vec!["lats".into(), " rhomboids ".into(), "".into()],
            })
        }

        async fn generate_exercises(&self, _request: &GenerateRequest) -> Result<ExercisePlan, ClientError> {
            unreachable!("upload never generates exercises")
        }
    }

    /// Store whose inserts always fail
    struct BrokenStore;

    impl MachineStore for BrokenStore {
        fn list_machines(&self) -> Result<Vec<Machine>> {
            Ok(vec![])
        }
        fn insert_machine(&self, _machine: &NewMachine) -> Result<Machine> {
            anyhow::bail!("disk full")
        }
        fn update_machine(&self, _id: i64, _update: &MachineUpdate) -> Result<()> {
            Ok(())
        }
        fn delete_machine(&self, _id: i64) -> Result<()> {
            Ok(())
        }
    }

    fn png() -> ImageFile {
        ImageFile::new("row.png", vec![0x89, b'P', b'N', b'G'])
    }

    #[test]
    fn test_mime_detection() {
        assert_eq!(mime_for_path(Path::new("a/B.JPG")), "image/jpeg");
        assert_eq!(mime_for_path(Path::new("x.webp")), "image/webp");
        assert_eq!(mime_for_path(Path::new("notes.txt")), "application/octet-stream");
        assert_eq!(mime_for_path(Path::new("noext")), "application/octet-stream");
    }

    #[test]
    fn test_data_url() {
        let file = ImageFile::new("a.png", b"abc".to_vec());
        assert_eq!(file.to_data_url(), "data:image/png;base64,YWJj");
    }

    #[tokio::test]
    async fn test_non_image_is_rejected_without_call() {
        let db = Database::open_in_memory().unwrap();
        let api = FakeApi::new(false);
        let mut form = UploadForm::new();

        let file = ImageFile::new("workout.pdf", b"%PDF".to_vec());
        assert!(form.submit(&file, &db, &api).await.is_none());

        assert_eq!(api.calls.get(), 0);
        assert!(form.preview.is_none());
        assert_eq!(form.notices.last().unwrap().message, "Please upload an image file");
        assert!(db.list_machines().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_success_creates_exactly_one_row() {
        let db = Database::open_in_memory().unwrap();
        let api = FakeApi::new(false);
        let mut form = UploadForm::new();

        let machine = form.submit(&png(), &db, &api).await.unwrap();
        assert_eq!(api.calls.get(), 1);
        assert!(!form.busy);

        let machines = db.list_machines().unwrap();
        assert_eq!(machines.len(), 1);
        assert_eq!(machines[0], machine);
        assert_eq!(machine.name, "Cable Row");
        assert_eq!(machine.muscles, vec!["lats", "rhomboids"]);
        assert_eq!(machine.image_url, form.preview);
        assert_eq!(form.notices.last().unwrap().level, crate::views::NoticeLevel::Success);
    }

    #[tokio::test]
    async fn test_analysis_failure_writes_nothing() {
        let db = Database::open_in_memory().unwrap();
        let api = FakeApi::new(true);
        let mut form = UploadForm::new();

        assert!(form.submit(&png(), &db, &api).await.is_none());
        assert!(db.list_machines().unwrap().is_empty());
        assert_eq!(form.notices.last().unwrap().message, FAILURE_MESSAGE);
        assert!(!form.busy);
    }

    #[tokio::test]
    async fn test_insert_failure_is_reported_generically() {
        let api = FakeApi::new(false);
        let mut form = UploadForm::new();

        assert!(form.submit(&png(), &BrokenStore, &api).await.is_none());
        assert_eq!(api.calls.get(), 1);
        assert_eq!(form.notices.last().unwrap().message, FAILURE_MESSAGE);
    }

    #[test]
    fn test_form_stays_locked_until_analysis_returns() {
        let db = Database::open_in_memory().unwrap();
        let mut form = UploadForm::new();

        let image_url = form.begin(&png()).unwrap();
        assert!(form.busy);
        assert!(form.begin(&png()).is_none());

        let guess = MachineGuess {
            name: "Hip Abductor".into(),
            muscles: vec!["glutes".into()],
        };
        let machine = form.finish("row.png", &image_url, Ok(guess), &db).unwrap();
        assert!(!form.busy);
        assert_eq!(machine.image_url.as_deref(), Some(image_url.as_str()));
        assert_eq!(db.list_machines().unwrap().len(), 1);
    }

    #[test]
    fn test_failed_analysis_unlocks_form() {
        let db = Database::open_in_memory().unwrap();
        let mut form = UploadForm::new();

        let image_url = form.begin(&png()).unwrap();
        let failure = Err(ClientError::Endpoint {
            status: 500,
            message: "Failed to analyze machine".into(),
        });
        assert!(form.finish("row.png", &image_url, failure, &db).is_none());
        assert!(!form.busy);
        assert_eq!(form.notices.last().unwrap().message, FAILURE_MESSAGE);
        assert!(form.begin(&png()).is_some());
    }

    #[tokio::test]
    async fn test_read_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("press.jpeg");
        std::fs::write(&path, b"jpegbytes").unwrap();

        let file = ImageFile::read(&path).unwrap();
        assert_eq!(file.name, "press.jpeg");
        assert_eq!(file.mime, "image/jpeg");
        assert!(file.is_image());
    }
}
