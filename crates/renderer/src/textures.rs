use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::thread;

use crossbeam_channel::{bounded, Receiver, TryRecvError};
use image::GenericImageView;

/// Decoded RGBA8 pixels ready for upload.
#[derive(Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl DecodedImage {
    pub fn from_rgba(width: u32, height: u32, rgba: Vec<u8>) -> Self {
        debug_assert_eq!(rgba.len(), (width as usize) * (height as usize) * 4);
        Self {
            width,
            height,
            rgba,
        }
    }

    /// Decodes any format the `image` crate was built with. Grayscale depth
    /// maps expand to RGBA with the luminance replicated into the red channel.
    pub fn decode(bytes: &[u8], origin: &str) -> Result<Self, TextureError> {
        let decoded = image::load_from_memory(bytes).map_err(|err| TextureError::Decode {
            source_name: origin.to_string(),
            message: err.to_string(),
        })?;
        let (width, height) = decoded.dimensions();
        Ok(Self::from_rgba(width, height, decoded.to_rgba8().into_raw()))
    }

    pub fn resolution(&self) -> [f32; 2] {
        [self.width as f32, self.height as f32]
    }
}

impl fmt::Debug for DecodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodedImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.rgba.len())
            .finish()
    }
}

/// Which half of the image pair a texture belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureSlot {
    Image,
    Depth,
}

impl fmt::Display for TextureSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextureSlot::Image => f.write_str("image"),
            TextureSlot::Depth => f.write_str("depth"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TextureError {
    #[error("failed to read image at {}: {message}", path.display())]
    Read { path: PathBuf, message: String },
    #[error("failed to fetch image from {url}: {message}")]
    Http { url: String, message: String },
    #[error("failed to decode image from {source_name}: {message}")]
    Decode { source_name: String, message: String },
    #[error("{slot} texture worker stopped before reporting a result")]
    Worker { slot: TextureSlot },
    #[error("failed to upload {slot} texture: {message}")]
    Upload { slot: TextureSlot, message: String },
}

/// Resolves an image source (path or URL) into decoded pixels.
///
/// Implementations run on worker threads and must not touch GPU state.
pub trait ImageFetcher: Send + Sync {
    fn fetch(&self, source: &str) -> Result<DecodedImage, TextureError>;
}

/// Reads local paths and `file://` URLs from disk and fetches `http(s)://`
/// URLs anonymously: no cookie store, no credentials.
#[derive(Default)]
pub struct DefaultFetcher {
    client: OnceLock<reqwest::blocking::Client>,
}

impl DefaultFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn client(&self) -> Result<&reqwest::blocking::Client, String> {
        self.client_or_build(|| {
            reqwest::blocking::Client::builder()
                .user_agent(concat!("parallaxview/", env!("CARGO_PKG_VERSION")))
                .build()
                .map_err(|err| err.to_string())
        })
    }

    /// Only a successfully built client is cached, so a later fetch retries.
    fn client_or_build(
        &self,
        build: impl FnOnce() -> Result<reqwest::blocking::Client, String>,
    ) -> Result<&reqwest::blocking::Client, String> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }
        let client = build()?;
        Ok(self.client.get_or_init(|| client))
    }

    fn fetch_remote(&self, url: &str) -> Result<DecodedImage, TextureError> {
        let http_error = |message: String| TextureError::Http {
            url: url.to_string(),
            message,
        };
        let client = self.client().map_err(http_error)?;
        let response = client
            .get(url)
            .send()
            .and_then(|response| response.error_for_status())
            .map_err(|err| http_error(err.to_string()))?;
        let bytes = response.bytes().map_err(|err| http_error(err.to_string()))?;
        DecodedImage::decode(&bytes, url)
    }

    fn fetch_local(&self, path: &Path) -> Result<DecodedImage, TextureError> {
        let bytes = std::fs::read(path).map_err(|err| TextureError::Read {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        DecodedImage::decode(&bytes, &path.display().to_string())
    }
}

impl ImageFetcher for DefaultFetcher {
    fn fetch(&self, source: &str) -> Result<DecodedImage, TextureError> {
        if source.starts_with("http://") || source.starts_with("https://") {
            self.fetch_remote(source)
        } else if let Some(path) = source.strip_prefix("file://") {
            self.fetch_local(Path::new(path))
        } else {
            self.fetch_local(Path::new(source))
        }
    }
}

/// Both halves of a successfully fetched image pair.
#[derive(Debug, Clone)]
pub struct ImagePair {
    pub image: DecodedImage,
    pub depth: DecodedImage,
}

type FetchResult = Result<DecodedImage, TextureError>;

struct FetchSlot {
    slot: TextureSlot,
    receiver: Option<Receiver<FetchResult>>,
    result: Option<FetchResult>,
}

impl FetchSlot {
    fn spawn(slot: TextureSlot, fetcher: Arc<dyn ImageFetcher>, source: String) -> Self {
        let (sender, receiver) = bounded(1);
        let spawned = thread::Builder::new()
            .name(format!("texture-fetch-{slot}"))
            .spawn(move || {
                let result = fetcher.fetch(&source);
                let _ = sender.send(result);
            });
        match spawned {
            Ok(_) => Self {
                slot,
                receiver: Some(receiver),
                result: None,
            },
            Err(err) => {
                tracing::error!(%slot, error = %err, "failed to spawn texture fetch worker");
                Self {
                    slot,
                    receiver: None,
                    result: Some(Err(TextureError::Worker { slot })),
                }
            }
        }
    }

    fn poll(&mut self) {
        if self.result.is_some() {
            return;
        }
        let Some(receiver) = self.receiver.as_ref() else {
            return;
        };
        match receiver.try_recv() {
            Ok(result) => self.result = Some(result),
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                self.result = Some(Err(TextureError::Worker { slot: self.slot }))
            }
        }
    }

    fn wait(&mut self) {
        if self.result.is_some() {
            return;
        }
        let result = match self.receiver.as_ref() {
            Some(receiver) => receiver
                .recv()
                .unwrap_or(Err(TextureError::Worker { slot: self.slot })),
            None => Err(TextureError::Worker { slot: self.slot }),
        };
        self.result = Some(result);
    }

    fn failed(&self) -> Option<&TextureError> {
        match &self.result {
            Some(Err(err)) => Some(err),
            _ => None,
        }
    }
}

/// An in-flight fetch of an image/depth pair.
///
/// Both sources are fetched concurrently on worker threads; the pair settles
/// once both succeed or as soon as either fails.
pub struct PendingTextures {
    image: FetchSlot,
    depth: FetchSlot,
}

impl PendingTextures {
    pub fn spawn(fetcher: Arc<dyn ImageFetcher>, image_source: &str, depth_source: &str) -> Self {
        tracing::debug!(image = image_source, depth = depth_source, "fetching texture pair");
        Self {
            image: FetchSlot::spawn(
                TextureSlot::Image,
                fetcher.clone(),
                image_source.to_string(),
            ),
            depth: FetchSlot::spawn(TextureSlot::Depth, fetcher, depth_source.to_string()),
        }
    }

    /// Non-blocking; returns `Some` once the pair has settled.
    pub fn poll(&mut self) -> Option<Result<ImagePair, TextureError>> {
        self.image.poll();
        self.depth.poll();
        self.settle()
    }

    /// Blocks until the pair settles.
    pub fn wait(mut self) -> Result<ImagePair, TextureError> {
        loop {
            if let Some(result) = self.poll() {
                return result;
            }
            // Either slot may still be running; block on whichever is unresolved.
            if self.image.result.is_none() {
                self.image.wait();
            } else {
                self.depth.wait();
            }
        }
    }

    fn settle(&mut self) -> Option<Result<ImagePair, TextureError>> {
        if let Some(err) = self.image.failed().or_else(|| self.depth.failed()) {
            return Some(Err(err.clone()));
        }
        if self.image.result.is_none() || self.depth.result.is_none() {
            return None;
        }
        match (self.image.result.take(), self.depth.result.take()) {
            (Some(Ok(image)), Some(Ok(depth))) => Some(Ok(ImagePair { image, depth })),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;

    struct MapFetcher {
        images: HashMap<String, FetchResult>,
        delay: HashMap<String, Duration>,
        calls: Mutex<Vec<String>>,
    }

    impl MapFetcher {
        fn new() -> Self {
            Self {
                images: HashMap::new(),
                delay: HashMap::new(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn with(mut self, source: &str, result: FetchResult) -> Self {
            self.images.insert(source.to_string(), result);
            self
        }

        fn slow(mut self, source: &str, delay: Duration) -> Self {
            self.delay.insert(source.to_string(), delay);
            self
        }
    }

    impl ImageFetcher for MapFetcher {
        fn fetch(&self, source: &str) -> FetchResult {
            self.calls.lock().unwrap().push(source.to_string());
            if let Some(delay) = self.delay.get(source) {
                thread::sleep(*delay);
            }
            self.images
                .get(source)
                .cloned()
                .unwrap_or_else(|| {
                    Err(TextureError::Read {
                        path: PathBuf::from(source),
                        message: "not found".into(),
                    })
                })
        }
    }

    fn pixel(value: u8) -> DecodedImage {
        DecodedImage::from_rgba(1, 1, vec![value, value, value, 255])
    }

    #[test]
    fn pair_settles_when_both_images_arrive() {
        let fetcher = MapFetcher::new()
            .with("a.jpg", Ok(pixel(10)))
            .with("a-depth.png", Ok(pixel(200)));
        let pending = PendingTextures::spawn(Arc::new(fetcher), "a.jpg", "a-depth.png");
        let pair = pending.wait().expect("pair");
        assert_eq!(pair.image, pixel(10));
        assert_eq!(pair.depth, pixel(200));
    }

    #[test]
    fn either_failure_fails_the_pair() {
        let fetcher = MapFetcher::new().with("a.jpg", Ok(pixel(10)));
        let pending = PendingTextures::spawn(Arc::new(fetcher), "a.jpg", "missing.png");
        let err = pending.wait().expect_err("depth is missing");
        assert!(matches!(err, TextureError::Read { ref path, .. } if path == Path::new("missing.png")));
    }

    #[test]
    fn failure_settles_without_waiting_for_the_slow_half() {
        let fetcher = MapFetcher::new()
            .with("slow.jpg", Ok(pixel(1)))
            .slow("slow.jpg", Duration::from_secs(5));
        let mut pending = PendingTextures::spawn(Arc::new(fetcher), "slow.jpg", "missing.png");
        let started = std::time::Instant::now();
        let settled = loop {
            if let Some(result) = pending.poll() {
                break result;
            }
            assert!(started.elapsed() < Duration::from_secs(4), "pair never settled");
            thread::sleep(Duration::from_millis(5));
        };
        assert!(settled.is_err());
    }

    #[test]
    fn poll_reports_nothing_until_settled() {
        let fetcher = MapFetcher::new()
            .with("a.jpg", Ok(pixel(1)))
            .with("b.png", Ok(pixel(2)))
            .slow("b.png", Duration::from_millis(200));
        let mut pending = PendingTextures::spawn(Arc::new(fetcher), "a.jpg", "b.png");
        assert!(pending.poll().is_none());
        assert!(pending.wait().is_ok());
    }

    #[test]
    fn decode_expands_grayscale_into_rgba() {
        let mut encoded = Vec::new();
        let gray = image::GrayImage::from_raw(2, 1, vec![0, 128]).unwrap();
        image::DynamicImage::ImageLuma8(gray)
            .write_to(
                &mut std::io::Cursor::new(&mut encoded),
                image::ImageFormat::Png,
            )
            .unwrap();
        let decoded = DecodedImage::decode(&encoded, "depth.png").unwrap();
        assert_eq!((decoded.width, decoded.height), (2, 1));
        assert_eq!(decoded.rgba, vec![0, 0, 0, 255, 128, 128, 128, 255]);
    }

    #[test]
    fn decode_rejects_garbage() {
        let err = DecodedImage::decode(b"not an image", "junk.bin").unwrap_err();
        assert!(matches!(err, TextureError::Decode { .. }));
    }

    #[test]
    fn default_fetcher_reads_local_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pixel.png");
        image::RgbaImage::from_raw(1, 1, vec![1, 2, 3, 255])
            .unwrap()
            .save(&path)
            .unwrap();

        let fetcher = DefaultFetcher::new();
        let from_path = fetcher.fetch(path.to_str().unwrap()).unwrap();
        let from_url = fetcher
            .fetch(&format!("file://{}", path.display()))
            .unwrap();
        assert_eq!(from_path.rgba, vec![1, 2, 3, 255]);
        assert_eq!(from_path, from_url);

        let missing = fetcher.fetch(dir.path().join("absent.png").to_str().unwrap());
        assert!(matches!(missing, Err(TextureError::Read { .. })));
    }

    #[test]
    fn failed_client_build_is_retried_on_next_fetch() {
        let fetcher = DefaultFetcher::new();
        let failed = fetcher.client_or_build(|| Err("tls backend unavailable".to_string()));
        assert_eq!(failed.err().as_deref(), Some("tls backend unavailable"));

        let built = fetcher.client_or_build(|| {
            reqwest::blocking::Client::builder()
                .build()
                .map_err(|err| err.to_string())
        });
        assert!(built.is_ok());

        let cached = fetcher.client_or_build(|| Err("not rebuilt".to_string()));
        assert!(cached.is_ok());
    }
}
