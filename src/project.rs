use log::{info, warn};
use uuid::Uuid;

use crate::canvas::{DisplayRect, StrokeCanvas};
use crate::components::tools::{BrushProperties, BrushTool, PointerEvent};
use crate::config::{EmptyMaskPolicy, MaskerConfig};
use crate::io::{EncodedImage, Photo};
use crate::ops::mask::{self, MaskImage};
use crate::ops::submit::{
    GenerationResponse, GenerativeBackend, ReferenceImage, SubmissionRequest, SubmitError,
};

/// Progress of the hand-off to the image generator.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SubmissionState {
    #[default]
    Idle,
    /// Waiting on the generator; re-submission is refused.
    InFlight { ticket: u64 },
    Succeeded(EncodedImage),
    Failed(String),
}

/// Proof that a submission was started, and for which photo.
#[derive(Debug)]
pub struct SubmissionTicket {
    id: u64,
    photo_generation: u64,
    pub request: SubmissionRequest,
}

/// The mask-painting screen's state: one photo, its drawing surface, the
/// brush, and the submission status.
pub struct Project {
    pub id: Uuid,
    photo: Option<Photo>,
    pub canvas: StrokeCanvas,
    pub brush: BrushTool,
    submission: SubmissionState,
    empty_mask_policy: EmptyMaskPolicy,
    /// Bumped on every photo load so stale results can be recognised.
    photo_generation: u64,
    next_ticket: u64,
}

impl Default for Project {
    fn default() -> Self {
        Self::new(&MaskerConfig::default())
    }
}

impl Project {
    pub fn new(config: &MaskerConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            photo: None,
            canvas: StrokeCanvas::with_settings(
                0,
                0,
                config.history.depth,
                config.preview_color(),
            ),
            brush: BrushTool::new(BrushProperties::from(&config.brush)),
            submission: SubmissionState::Idle,
            empty_mask_policy: config.submission.empty_mask_policy,
            photo_generation: 0,
            next_ticket: 1,
        }
    }

    pub fn photo(&self) -> Option<&Photo> {
        self.photo.as_ref()
    }

    pub fn submission(&self) -> &SubmissionState {
        &self.submission
    }

    pub fn is_submitting(&self) -> bool {
        matches!(self.submission, SubmissionState::InFlight { .. })
    }

    /// Replace the photo. History, any pending stroke and any pending
    /// submission are dropped, and the canvas takes the new size.
    pub fn load_photo(&mut self, photo: Photo) {
        let (w, h) = photo.dimensions();
        if let SubmissionState::InFlight { ticket } = self.submission {
            warn!("photo replaced while submission #{} was in flight", ticket);
        }
        self.canvas.reset(w, h);
        self.photo = Some(photo);
        self.photo_generation += 1;
        self.submission = SubmissionState::Idle;
        info!("canvas initialised at {}x{}", w, h);
    }

    /// Route an input event through the brush. Ignored until a photo is loaded.
    pub fn pointer(&mut self, event: PointerEvent, view: &DisplayRect) -> bool {
        if self.photo.is_none() {
            return false;
        }
        self.brush.handle_pointer(event, view, &mut self.canvas)
    }

    pub fn compile_mask(&self) -> Option<MaskImage> {
        self.photo.as_ref()?;
        Some(mask::compile(self.canvas.surface()))
    }

    /// Build the request and mark the submission in flight.
    pub fn begin_submission(
        &mut self,
        references: Vec<ReferenceImage>,
        prompt: impl Into<String>,
    ) -> Result<SubmissionTicket, SubmitError> {
        if self.is_submitting() {
            return Err(SubmitError::AlreadyInFlight);
        }
        let photo = self.photo.as_ref().ok_or(SubmitError::NoPhoto)?;

        // The buffer must not change under the compiler.
        self.canvas.end_stroke();
        let mask = mask::compile(self.canvas.surface());
        if mask.is_empty() {
            match self.empty_mask_policy {
                EmptyMaskPolicy::Block => return Err(SubmitError::EmptyMask),
                EmptyMaskPolicy::Warn => {
                    warn!("submitting an empty mask; the generator will be asked to change nothing")
                }
                EmptyMaskPolicy::Allow => {}
            }
        }

        let request = SubmissionRequest {
            photo: photo.to_encoded(),
            mask: mask.to_encoded()?,
            references,
            prompt: prompt.into(),
        };

        let id = self.next_ticket;
        self.next_ticket += 1;
        self.submission = SubmissionState::InFlight { ticket: id };
        info!(
            "submission #{} started: {} masked pixels, {} references",
            id,
            mask.white_pixel_count(),
            request.references.len()
        );
        Ok(SubmissionTicket {
            id,
            photo_generation: self.photo_generation,
            request,
        })
    }

    /// Record the generator's answer for `ticket`. Answers for a photo that
    /// has since been replaced are discarded.
    pub fn finish_submission(
        &mut self,
        ticket: SubmissionTicket,
        result: Result<GenerationResponse, SubmitError>,
    ) -> Result<EncodedImage, SubmitError> {
        let current = self.submission == SubmissionState::InFlight { ticket: ticket.id };
        if ticket.photo_generation != self.photo_generation || !current {
            warn!("discarding result of stale submission #{}", ticket.id);
            return Err(SubmitError::Superseded);
        }

        match result.and_then(GenerationResponse::into_image) {
            Ok(image) => {
                info!(
                    "submission #{} returned {} ({} bytes)",
                    ticket.id,
                    image.mime,
                    image.bytes.len()
                );
                self.submission = SubmissionState::Succeeded(image.clone());
                Ok(image)
            }
            Err(e) => {
                warn!("submission #{} failed: {}", ticket.id, e);
                self.submission = SubmissionState::Failed(e.to_string());
                Err(e)
            }
        }
    }

    /// Begin, call the generator, and record the outcome.
    pub fn submit(
        &mut self,
        backend: &dyn GenerativeBackend,
        references: Vec<ReferenceImage>,
        prompt: impl Into<String>,
    ) -> Result<EncodedImage, SubmitError> {
        let ticket = self.begin_submission(references, prompt)?;
        let result = backend.generate(&ticket.request);
        self.finish_submission(ticket, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::tests::png_bytes;
    use std::cell::Cell;

    fn photo(w: u32, h: u32) -> Photo {
        Photo::from_bytes(png_bytes(w, h), Some("image/png")).unwrap()
    }

    fn paint(project: &mut Project) {
        let (w, h) = project.photo().unwrap().dimensions();
        let view = DisplayRect::native(w, h);
        project.pointer(PointerEvent::Down { x: 5.0, y: 5.0 }, &view);
        project.pointer(PointerEvent::Move { x: 15.0, y: 10.0 }, &view);
        project.pointer(PointerEvent::Up, &view);
    }

    fn echo_backend(
        calls: &Cell<u32>,
    ) -> impl Fn(&SubmissionRequest) -> Result<GenerationResponse, SubmitError> + '_ {
        move |req| {
            calls.set(calls.get() + 1);
            Ok(GenerationResponse {
                image: Some(req.mask.clone()),
                text: None,
            })
        }
    }

    #[test]
    fn input_before_photo_is_ignored() {
        let mut project = Project::default();
        let view = DisplayRect::native(10, 10);
        assert!(!project.pointer(PointerEvent::Down { x: 1.0, y: 1.0 }, &view));
        assert!(project.compile_mask().is_none());
        let calls = Cell::new(0);
        assert!(matches!(
            project.submit(&echo_backend(&calls), Vec::new(), "x"),
            Err(SubmitError::NoPhoto)
        ));
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn reload_resets_history_and_size() {
        let mut project = Project::default();
        project.load_photo(photo(40, 30));
        paint(&mut project);
        assert!(project.canvas.can_undo());

        project.load_photo(photo(25, 60));
        assert_eq!(project.canvas.surface().dimensions(), (25, 60));
        assert!(!project.canvas.can_undo());
        assert!(!project.canvas.surface().has_paint());
        assert_eq!(project.compile_mask().unwrap().dimensions(), (25, 60));
    }

    #[test]
    fn empty_mask_is_blocked_by_default() {
        let mut project = Project::default();
        project.load_photo(photo(20, 20));
        let calls = Cell::new(0);
        assert!(matches!(
            project.submit(&echo_backend(&calls), Vec::new(), "new sign"),
            Err(SubmitError::EmptyMask)
        ));
        assert_eq!(calls.get(), 0);
        assert_eq!(project.submission(), &SubmissionState::Idle);
    }

    #[test]
    fn empty_mask_allowed_when_configured() {
        let mut config = MaskerConfig::default();
        config.submission.empty_mask_policy = EmptyMaskPolicy::Warn;
        let mut project = Project::new(&config);
        project.load_photo(photo(20, 20));
        let calls = Cell::new(0);
        assert!(project.submit(&echo_backend(&calls), Vec::new(), "x").is_ok());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn successful_submission_hands_off_all_four_items() {
        let mut project = Project::default();
        project.load_photo(photo(20, 20));
        paint(&mut project);

        let reference = ReferenceImage {
            image: EncodedImage::new("image/jpeg", vec![1, 2, 3]),
            description: "brick texture".to_string(),
        };
        let ticket = project
            .begin_submission(vec![reference.clone()], "brick facade")
            .unwrap();
        assert!(project.is_submitting());
        assert_eq!(ticket.request.photo.bytes, project.photo().unwrap().bytes());
        assert_eq!(ticket.request.photo.mime, "image/png");
        assert_eq!(ticket.request.mask.mime, "image/png");
        assert_eq!(ticket.request.references, vec![reference]);
        assert_eq!(ticket.request.prompt, "brick facade");

        // Re-submission is refused while in flight.
        assert!(matches!(
            project.begin_submission(Vec::new(), "again"),
            Err(SubmitError::AlreadyInFlight)
        ));

        let result = EncodedImage::new("image/png", vec![9, 9]);
        let reply = GenerationResponse {
            image: Some(result.clone()),
            text: None,
        };
        assert_eq!(project.finish_submission(ticket, Ok(reply)).unwrap(), result);
        assert_eq!(project.submission(), &SubmissionState::Succeeded(result));
    }

    #[test]
    fn backend_failure_is_reported_without_retry() {
        let mut project = Project::default();
        project.load_photo(photo(20, 20));
        paint(&mut project);
        let calls = Cell::new(0);
        let failing = |_: &SubmissionRequest| -> Result<GenerationResponse, SubmitError> {
            calls.set(calls.get() + 1);
            Err(SubmitError::Backend("quota exceeded".to_string()))
        };
        let err = project.submit(&failing, Vec::new(), "x").unwrap_err();
        assert!(matches!(err, SubmitError::Backend(_)));
        assert_eq!(calls.get(), 1);
        assert_eq!(
            project.submission(),
            &SubmissionState::Failed("generation failed: quota exceeded".to_string())
        );
        // A failed attempt does not block the next one.
        assert!(project.begin_submission(Vec::new(), "x").is_ok());
    }

    #[test]
    fn result_for_replaced_photo_is_discarded() {
        let mut project = Project::default();
        project.load_photo(photo(20, 20));
        paint(&mut project);
        let ticket = project.begin_submission(Vec::new(), "x").unwrap();

        project.load_photo(photo(30, 30));
        assert_eq!(project.submission(), &SubmissionState::Idle);

        let reply = GenerationResponse {
            image: Some(EncodedImage::new("image/png", vec![1])),
            text: None,
        };
        assert!(matches!(
            project.finish_submission(ticket, Ok(reply)),
            Err(SubmitError::Superseded)
        ));
        assert_eq!(project.submission(), &SubmissionState::Idle);
    }

    #[test]
    fn submission_ends_an_active_stroke() {
        let mut project = Project::default();
        project.load_photo(photo(20, 20));
        let view = DisplayRect::native(20, 20);
        project.pointer(PointerEvent::Down { x: 5.0, y: 5.0 }, &view);
        project.pointer(PointerEvent::Move { x: 10.0, y: 5.0 }, &view);
        let ticket = project.begin_submission(Vec::new(), "x").unwrap();
        assert!(!project.canvas.is_stroking());
        assert!(!ticket.request.mask.bytes.is_empty());
    }
}
