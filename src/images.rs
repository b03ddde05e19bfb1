//! Inline image resolution.
//!
//! Prepared documents carry placeholders for embedded images
//! (`img.inline-image` with `data-doc-id` and `data-image-index`). After a
//! load they are queued and resolved on later ticks through the
//! [`ImageSource`] collaborator, each one independently: a failed image is
//! logged and stays a placeholder.

use std::collections::VecDeque;

use crate::dom::{ArenaDom, ArenaNodeId, Query};
use crate::error::{Error, Result};
use crate::host::{DocumentId, ImageSource};
use crate::layout::style::INLINE_IMAGE_CLASS;

/// One placeholder waiting for its data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageJob {
    pub element: ArenaNodeId,
    pub document: DocumentId,
    pub index: u32,
}

/// Placeholders beneath `root`, in document order. Images whose attributes
/// do not parse are skipped.
pub fn find_inline_images(dom: &ArenaDom, root: ArenaNodeId) -> Vec<ImageJob> {
    let css = format!("img.{INLINE_IMAGE_CLASS}[data-doc-id][data-image-index]");
    let Ok(query) = Query::parse(&css) else {
        return Vec::new();
    };
    query
        .select_all(dom, root)
        .into_iter()
        .filter_map(|element| {
            let document = dom.get_attr(element, "data-doc-id")?.parse().ok()?;
            let index = dom.get_attr(element, "data-image-index")?.parse().ok()?;
            Some(ImageJob {
                element,
                document: DocumentId(document),
                index,
            })
        })
        .collect()
}

/// Outcome of one resolution pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageReport {
    pub resolved: usize,
    pub failed: usize,
}

#[derive(Debug, Default)]
pub struct ImageResolver {
    queue: VecDeque<ImageJob>,
}

impl ImageResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue every placeholder beneath `root`.
    pub fn enqueue(&mut self, dom: &ArenaDom, root: ArenaNodeId) {
        let jobs = find_inline_images(dom, root);
        log::debug!("queued {} inline images", jobs.len());
        self.queue.extend(jobs);
    }

    /// Forget queued jobs; their nodes belong to a superseded load.
    pub fn clear(&mut self) {
        self.queue.clear();
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Resolve every queued image.
    pub fn resolve_pending<S: ImageSource + ?Sized>(
        &mut self,
        source: &S,
        dom: &mut ArenaDom,
    ) -> ImageReport {
        let mut report = ImageReport::default();
        while let Some(job) = self.queue.pop_front() {
            match resolve_one(source, dom, &job) {
                Ok(()) => report.resolved += 1,
                Err(e) => {
                    log::warn!("failed to resolve image: {e}");
                    report.failed += 1;
                }
            }
        }
        report
    }
}

fn resolve_one<S: ImageSource + ?Sized>(source: &S, dom: &mut ArenaDom, job: &ImageJob) -> Result<()> {
    if !dom.is_attached(job.element) {
        return Err(Error::InlineResource {
            document: job.document.0,
            index: job.index,
            reason: "placeholder is no longer in the document".to_string(),
        });
    }
    let uri = source.inline_image_data(job.document, job.index)?;
    dom.set_attr(job.element, "src", &uri);
    Ok(())
}
