//! Submissions, sources and a fake site for pipeline tests

use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;
use submission_dl::{
    AuthContext, Direct, Downloader, ExtractionError, ResolutionError, Resource,
    ResourceResolver, SourceError, Submission, SubmissionStream,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creation timestamp shared by fixture submissions
pub const CREATED_UTC: f64 = 1_500_000_000.0;

/// Submission in `subreddit` pointing at `url`
pub fn submission(id: &str, subreddit: &str, url: &str) -> Submission {
    Submission {
        id: id.to_string(),
        subreddit: subreddit.to_string(),
        author: Some("archivist".to_string()),
        title: Some(format!("Post {}", id)),
        score: 42,
        upvote_ratio: 0.9,
        url: url.to_string(),
        created_utc: CREATED_UTC,
    }
}

/// Source yielding `items` in order
pub fn listing(items: Vec<Result<Submission, SourceError>>) -> SubmissionStream {
    futures::stream::iter(items).boxed()
}

/// Serve `body` at `route`, expecting exactly `hits` requests
pub async fn serve(server: &MockServer, route: &str, body: &[u8], hits: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .expect(hits)
        .mount(server)
        .await;
}

/// Gallery pages list their images as `{page}/img/{n}.png`
pub struct GallerySite {
    /// Images per gallery
    pub images: usize,
}

#[async_trait]
impl Downloader for GallerySite {
    fn module_name(&self) -> &str {
        "Gallery"
    }

    async fn find_resources(
        &self,
        submission: &Submission,
        _auth: &AuthContext,
    ) -> Result<Vec<Resource>, ExtractionError> {
        if self.images == 0 {
            return Err(ExtractionError::new("Gallery", "gallery has no images"));
        }
        Ok((1..=self.images)
            .map(|n| Resource::new(format!("{}/img/{}.png", submission.url, n)))
            .collect())
    }
}

/// Routes `/gallery/` URLs to [`GallerySite`] and everything else to [`Direct`]
pub struct SiteResolver {
    /// Downloader for gallery pages
    pub gallery: Arc<GallerySite>,
}

impl ResourceResolver for SiteResolver {
    fn resolve(&self, url: &str) -> Result<Arc<dyn Downloader>, ResolutionError> {
        if url.contains("/gallery/") {
            Ok(self.gallery.clone())
        } else if url.starts_with("http") {
            Ok(Arc::new(Direct))
        } else {
            Err(ResolutionError::new(url, "no site matches"))
        }
    }
}
