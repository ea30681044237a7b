use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::models::media::MediaKind;
use crate::models::status::ProcessingResult;
use crate::models::upload::UploadedFile;
use crate::services::describe::MediaDescriber;
use crate::services::gemini::ModelError;
use crate::services::judge::{InvalidVerdict, Judge, Verdict};
use crate::services::media::{MediaEncoder, MediaError};
use crate::services::song::{write_song, SongError, SongSynthesizer};
use crate::services::status_store::StatusStore;
use crate::utils::format_size;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Media(#[from] MediaError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Verdict(#[from] InvalidVerdict),
    #[error(transparent)]
    Song(#[from] SongError),
    #[error("processing task aborted: {0}")]
    Aborted(String),
}

/// Drives one upload from stored file to terminal status.
pub struct Pipeline {
    store: StatusStore,
    encoder: MediaEncoder,
    describer: Arc<dyn MediaDescriber>,
    judge: Arc<dyn Judge>,
    synthesizer: Arc<dyn SongSynthesizer>,
    song_dir: PathBuf,
}

impl Pipeline {
    pub fn new(
        store: StatusStore,
        encoder: MediaEncoder,
        describer: Arc<dyn MediaDescriber>,
        judge: Arc<dyn Judge>,
        synthesizer: Arc<dyn SongSynthesizer>,
        song_dir: PathBuf,
    ) -> Self {
        Self {
            store,
            encoder,
            describer,
            judge,
            synthesizer,
            song_dir,
        }
    }

    pub fn store(&self) -> &StatusStore {
        &self.store
    }

    /// Fire-and-forget entry point used by the upload handler.
    pub fn spawn(self: &Arc<Self>, upload: UploadedFile) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.run(upload).await })
    }

    /// Runs the stages, deletes the upload, then records the terminal state.
    ///
    /// The stages run in their own task so a panic in one pipeline still
    /// ends with an `error` record and a removed upload.
    pub async fn run(self: Arc<Self>, upload: UploadedFile) {
        let start = Instant::now();
        let filename = upload.filename.clone();
        let path = upload.path.clone();
        info!(
            filename = %filename,
            original = %upload.original_name,
            size = %format_size(upload.size as usize),
            "Pipeline started"
        );

        let this = Arc::clone(&self);
        let outcome = match tokio::spawn(async move { this.process(&upload).await }).await {
            Ok(outcome) => outcome,
            Err(e) => Err(PipelineError::Aborted(e.to_string())),
        };

        remove_upload(&path).await;

        match outcome {
            Ok(result) => {
                self.store.complete(&filename, result);
                info!(filename = %filename, elapsed = ?start.elapsed(), "Pipeline completed");
            }
            Err(e) => {
                error!(filename = %filename, elapsed = ?start.elapsed(), error = %e, "Pipeline failed");
                self.store.fail(&filename, e.to_string());
            }
        }
    }

    async fn process(&self, upload: &UploadedFile) -> Result<ProcessingResult, PipelineError> {
        match MediaKind::from_filename(&upload.filename) {
            MediaKind::Audio => self.process_audio(upload).await,
            MediaKind::Video => self.process_video(upload).await,
            MediaKind::Other => {
                info!(filename = %upload.filename, "Unsupported file type, skipping");
                Ok(ProcessingResult::unsupported())
            }
        }
    }

    async fn process_audio(&self, upload: &UploadedFile) -> Result<ProcessingResult, PipelineError> {
        self.stage(upload, "Encoding audio");
        let audio = self.encoder.encode_file(&upload.path).await?;

        self.stage(upload, "Describing audio");
        let description = self.describer.describe_audio(audio).await?;

        Ok(ProcessingResult::Audio { description })
    }

    async fn process_video(&self, upload: &UploadedFile) -> Result<ProcessingResult, PipelineError> {
        self.stage(upload, "Extracting audio from video");
        let audio = match self.encoder.extract_audio(&upload.path).await {
            Ok(audio) => audio,
            Err(e) => {
                warn!(filename = %upload.filename, error = %e, "Audio extraction failed, using full container");
                self.stage(upload, "Audio extraction failed, using fallback");
                self.encoder.extract_audio_fallback(&upload.path).await?
            }
        };

        self.stage(upload, "Describing audio");
        let audio_description = self.describer.describe_audio(audio).await?;

        self.stage(upload, "Describing video");
        let video = self.encoder.encode_file(&upload.path).await?;
        let video_description = self.describer.describe_video(video).await?;

        self.stage(upload, "Judging descriptions");
        let verdict_text = self
            .judge
            .judge(&audio_description, &video_description)
            .await?;
        let verdict: Verdict = verdict_text.parse()?;
        info!(filename = %upload.filename, verdict = %verdict, "Descriptions judged");

        self.stage(upload, "Summarizing");
        let summary = self
            .judge
            .summarize(&audio_description, &video_description, verdict)
            .await?;

        self.stage(upload, "Writing song description");
        let song_description = self.judge.describe_song(&summary).await?;

        self.stage(upload, "Generating song");
        let audio = self.synthesizer.synthesize(&song_description).await?;
        let stem = Path::new(&upload.filename)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| upload.filename.clone());
        let song = write_song(&self.song_dir, &stem, audio).await?;

        Ok(ProcessingResult::Video {
            audio_description,
            video_description,
            verdict: verdict.to_string(),
            summary,
            song_description,
            song: song.info(),
        })
    }

    fn stage(&self, upload: &UploadedFile, message: &str) {
        info!(filename = %upload.filename, stage = message);
        self.store.progress(&upload.filename, message);
    }
}

async fn remove_upload(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => info!(path = %path.display(), "Removed processed upload"),
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove upload"),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::status::{Status, UNSUPPORTED_DESCRIPTION};
    use crate::services::media::temp_audio_path;
    use crate::services::media::tests::{fake_ffmpeg, DEMUX_FAIL, DEMUX_OK};
    use async_trait::async_trait;
    use base64::{engine::general_purpose::STANDARD, Engine};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    pub(crate) struct Calls {
        pub audio: AtomicUsize,
        pub video: AtomicUsize,
        pub judge: AtomicUsize,
        pub song: AtomicUsize,
    }

    impl Calls {
        pub fn total(&self) -> usize {
            self.audio.load(Ordering::SeqCst)
                + self.video.load(Ordering::SeqCst)
                + self.judge.load(Ordering::SeqCst)
                + self.song.load(Ordering::SeqCst)
        }
    }

    pub(crate) struct StubDescriber {
        pub calls: Arc<Calls>,
        pub audio: &'static str,
        pub video: &'static str,
        pub seen_audio: Mutex<Vec<String>>,
        pub fail: bool,
        pub panic: bool,
    }

    impl StubDescriber {
        pub fn new(calls: Arc<Calls>, audio: &'static str, video: &'static str) -> Self {
            Self {
                calls,
                audio,
                video,
                seen_audio: Mutex::new(Vec::new()),
                fail: false,
                panic: false,
            }
        }
    }

    #[async_trait]
    impl MediaDescriber for StubDescriber {
        async fn describe_audio(&self, audio_base64: String) -> Result<String, ModelError> {
            self.calls.audio.fetch_add(1, Ordering::SeqCst);
            if self.panic {
                panic!("describer blew up");
            }
            if self.fail {
                return Err(ModelError::Api {
                    status: 503,
                    message: "model overloaded".to_string(),
                });
            }
            self.seen_audio.lock().unwrap().push(audio_base64);
            Ok(self.audio.to_string())
        }

        async fn describe_video(&self, _video_base64: String) -> Result<String, ModelError> {
            self.calls.video.fetch_add(1, Ordering::SeqCst);
            Ok(self.video.to_string())
        }
    }

    pub(crate) struct StubJudge {
        pub calls: Arc<Calls>,
        pub verdict: &'static str,
        pub summaries: Mutex<Vec<(String, String, Verdict)>>,
    }

    impl StubJudge {
        pub fn new(calls: Arc<Calls>, verdict: &'static str) -> Self {
            Self {
                calls,
                verdict,
                summaries: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Judge for StubJudge {
        async fn judge(&self, _audio: &str, _video: &str) -> Result<String, ModelError> {
            self.calls.judge.fetch_add(1, Ordering::SeqCst);
            Ok(self.verdict.to_string())
        }

        async fn summarize(
            &self,
            audio: &str,
            video: &str,
            verdict: Verdict,
        ) -> Result<String, ModelError> {
            self.calls.judge.fetch_add(1, Ordering::SeqCst);
            self.summaries
                .lock()
                .unwrap()
                .push((audio.to_string(), video.to_string(), verdict));
            Ok(format!("summary of {}", video))
        }

        async fn describe_song(&self, summary: &str) -> Result<String, ModelError> {
            self.calls.judge.fetch_add(1, Ordering::SeqCst);
            Ok(format!("upbeat song about {}", summary))
        }
    }

    pub(crate) struct StubSynth {
        pub calls: Arc<Calls>,
    }

    #[async_trait]
    impl SongSynthesizer for StubSynth {
        async fn synthesize(&self, _prompt: &str) -> Result<Vec<u8>, SongError> {
            self.calls.song.fetch_add(1, Ordering::SeqCst);
            Ok(b"RIFFsong".to_vec())
        }
    }

    struct Harness {
        dir: tempfile::TempDir,
        calls: Arc<Calls>,
        judge: Arc<StubJudge>,
        describer: Arc<StubDescriber>,
        pipeline: Arc<Pipeline>,
    }

    fn harness(describer: StubDescriber, verdict: &'static str, calls: Arc<Calls>) -> Harness {
        harness_with_ffmpeg(describer, verdict, calls, "no-such-ffmpeg-binary")
    }

    fn harness_with_ffmpeg(
        describer: StubDescriber,
        verdict: &'static str,
        calls: Arc<Calls>,
        ffmpeg: &str,
    ) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let judge = Arc::new(StubJudge::new(calls.clone(), verdict));
        let describer = Arc::new(describer);
        let pipeline = Arc::new(Pipeline::new(
            StatusStore::new(),
            MediaEncoder::new(ffmpeg),
            describer.clone(),
            judge.clone(),
            Arc::new(StubSynth {
                calls: calls.clone(),
            }),
            dir.path().join("generated-songs"),
        ));
        Harness {
            dir,
            calls,
            judge,
            describer,
            pipeline,
        }
    }

    fn stage_upload(h: &Harness, filename: &str, original: &str, bytes: &[u8]) -> UploadedFile {
        let path = h.dir.path().join(filename);
        std::fs::write(&path, bytes).unwrap();
        assert!(h.pipeline.store().begin(filename, original));
        UploadedFile {
            filename: filename.to_string(),
            original_name: original.to_string(),
            size: bytes.len() as u64,
            path,
        }
    }

    #[tokio::test]
    async fn audio_upload_is_described() {
        let calls = Arc::new(Calls::default());
        let h = harness(
            StubDescriber::new(calls.clone(), "description A", "unused"),
            "True",
            calls,
        );
        let upload = stage_upload(&h, "file-1-1.mp3", "guitar.mp3", b"mp3 bytes");
        let path = upload.path.clone();

        h.pipeline.clone().run(upload).await;

        let record = h.pipeline.store().get("file-1-1.mp3").unwrap();
        assert_eq!(record.status, Status::Completed);
        assert_eq!(
            record.result,
            Some(ProcessingResult::Audio {
                description: "description A".to_string()
            })
        );
        assert_eq!(
            h.describer.seen_audio.lock().unwrap().as_slice(),
            [STANDARD.encode(b"mp3 bytes")]
        );
        assert_eq!(h.calls.video.load(Ordering::SeqCst), 0);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn unsupported_upload_makes_no_calls() {
        let calls = Arc::new(Calls::default());
        let h = harness(StubDescriber::new(calls.clone(), "a", "v"), "True", calls);
        let upload = stage_upload(&h, "file-1-2.txt", "notes.txt", b"hello");
        let path = upload.path.clone();

        h.pipeline.clone().run(upload).await;

        let record = h.pipeline.store().get("file-1-2.txt").unwrap();
        assert_eq!(record.status, Status::Completed);
        assert_eq!(
            record.result,
            Some(ProcessingResult::Other {
                description: UNSUPPORTED_DESCRIPTION.to_string()
            })
        );
        assert_eq!(h.calls.total(), 0);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn video_falls_back_when_extraction_fails() {
        let calls = Arc::new(Calls::default());
        let h = harness(
            StubDescriber::new(calls.clone(), "guitar strumming", "someone playing guitar"),
            "True",
            calls,
        );
        let upload = stage_upload(&h, "file-1-3.MOV", "day.MOV", b"container");
        let path = upload.path.clone();

        h.pipeline.clone().run(upload).await;

        let record = h.pipeline.store().get("file-1-3.MOV").unwrap();
        assert_eq!(record.status, Status::Completed, "{:?}", record.error);
        // The fallback hands the whole container to the audio describer.
        assert_eq!(
            h.describer.seen_audio.lock().unwrap().as_slice(),
            [STANDARD.encode(b"container")]
        );
        match record.result {
            Some(ProcessingResult::Video {
                verdict,
                song,
                song_description,
                ..
            }) => {
                assert_eq!(verdict, "True");
                assert!(song_description.starts_with("upbeat song about"));
                assert_eq!(std::fs::read(&song.path).unwrap(), b"RIFFsong");
                assert!(song.filename.starts_with("file-1-3-song-"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(h.calls.song.load(Ordering::SeqCst), 1);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn video_uses_demuxed_audio_track() {
        let tools = tempfile::tempdir().unwrap();
        let ffmpeg = fake_ffmpeg(tools.path(), DEMUX_OK);
        let calls = Arc::new(Calls::default());
        let h = harness_with_ffmpeg(
            StubDescriber::new(calls.clone(), "birdsong", "a forest walk"),
            "True",
            calls,
            &ffmpeg.to_string_lossy(),
        );
        let upload = stage_upload(&h, "file-1-8.mp4", "walk.mp4", b"container");
        let path = upload.path.clone();

        h.pipeline.clone().run(upload).await;

        let record = h.pipeline.store().get("file-1-8.mp4").unwrap();
        assert_eq!(record.status, Status::Completed, "{:?}", record.error);
        assert_eq!(
            h.describer.seen_audio.lock().unwrap().as_slice(),
            [STANDARD.encode(b"mp3 frames")]
        );
        assert!(!temp_audio_path(&path).exists());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn failing_ffmpeg_falls_back_to_container() {
        let tools = tempfile::tempdir().unwrap();
        let ffmpeg = fake_ffmpeg(tools.path(), DEMUX_FAIL);
        let calls = Arc::new(Calls::default());
        let h = harness_with_ffmpeg(
            StubDescriber::new(calls.clone(), "traffic", "a busy street"),
            "True",
            calls,
            &ffmpeg.to_string_lossy(),
        );
        let upload = stage_upload(&h, "file-1-9.mp4", "street.mp4", b"container");
        let path = upload.path.clone();

        h.pipeline.clone().run(upload).await;

        let record = h.pipeline.store().get("file-1-9.mp4").unwrap();
        assert_eq!(record.status, Status::Completed, "{:?}", record.error);
        assert_eq!(
            h.describer.seen_audio.lock().unwrap().as_slice(),
            [STANDARD.encode(b"container")]
        );
        assert_eq!(h.calls.song.load(Ordering::SeqCst), 1);
        assert!(!temp_audio_path(&path).exists());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn different_verdict_summarizes_video_only() {
        let calls = Arc::new(Calls::default());
        let h = harness(
            StubDescriber::new(calls.clone(), "dog barking", "car driving"),
            "False",
            calls,
        );
        let upload = stage_upload(&h, "file-1-4.mp4", "street.mp4", b"video");

        h.pipeline.clone().run(upload).await;

        let summaries = h.judge.summaries.lock().unwrap().clone();
        assert_eq!(summaries.len(), 1);
        let (audio, video, verdict) = &summaries[0];
        assert_eq!(verdict, &Verdict::Different);
        assert_eq!(audio, "dog barking");
        assert_eq!(video, "car driving");
        let prompt = crate::services::judge::summary_prompt(audio, video, *verdict);
        assert!(!prompt.contains("dog barking"));

        let record = h.pipeline.store().get("file-1-4.mp4").unwrap();
        assert_eq!(record.status, Status::Completed);
    }

    #[tokio::test]
    async fn model_error_marks_record_failed_and_removes_file() {
        let calls = Arc::new(Calls::default());
        let mut describer = StubDescriber::new(calls.clone(), "a", "v");
        describer.fail = true;
        let h = harness(describer, "True", calls);
        let upload = stage_upload(&h, "file-1-5.wav", "take.wav", b"wav");
        let path = upload.path.clone();

        h.pipeline.clone().run(upload).await;

        let record = h.pipeline.store().get("file-1-5.wav").unwrap();
        assert_eq!(record.status, Status::Error);
        assert_eq!(
            record.error.as_deref(),
            Some("model API returned 503: model overloaded")
        );
        assert!(record.result.is_none());
        assert!(!path.exists());
        assert!(!h.pipeline.store().progress("file-1-5.wav", "late"));
    }

    #[tokio::test]
    async fn unexpected_verdict_aborts_before_summary() {
        let calls = Arc::new(Calls::default());
        let h = harness(StubDescriber::new(calls.clone(), "a", "v"), "Maybe", calls);
        let upload = stage_upload(&h, "file-1-6.avi", "x.avi", b"avi");

        h.pipeline.clone().run(upload).await;

        let record = h.pipeline.store().get("file-1-6.avi").unwrap();
        assert_eq!(record.status, Status::Error);
        assert!(record
            .error
            .unwrap()
            .starts_with("Invalid similarity value"));
        assert!(h.judge.summaries.lock().unwrap().is_empty());
        assert_eq!(h.calls.song.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn panicking_stage_still_terminates() {
        let calls = Arc::new(Calls::default());
        let mut describer = StubDescriber::new(calls.clone(), "a", "v");
        describer.panic = true;
        let h = harness(describer, "True", calls);
        let upload = stage_upload(&h, "file-1-7.mp3", "boom.mp3", b"mp3");
        let path = upload.path.clone();

        h.pipeline.spawn(upload).await.unwrap();

        let record = h.pipeline.store().get("file-1-7.mp3").unwrap();
        assert_eq!(record.status, Status::Error);
        assert!(record.error.unwrap().starts_with("processing task aborted"));
        assert!(!path.exists());
    }
}
