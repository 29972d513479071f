use url::Url;

/// Just a wrapper around the API root URL and the credentials to use it
#[derive(Clone, Debug)]
pub struct Resource {
    url: Url,
    token: Option<String>,
}

impl Resource {
    pub fn new(url: Url, token: Option<String>) -> Self {
        Self { url, token }
    }

    pub fn url(&self) -> &Url { &self.url }
    pub fn token(&self) -> Option<&str> { self.token.as_deref() }

    /// Build the URL of an endpoint below the API root, e.g. `["tasks", "2024-05-01"]`
    pub fn endpoint(&self, segments: &[&str]) -> Url {
        let mut built = self.url.clone();
        if let Ok(mut path) = built.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        built
    }
}
