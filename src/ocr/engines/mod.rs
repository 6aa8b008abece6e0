//! Recognition engine interface.
//!
//! An engine turns one raster page into an unordered set of [`Detection`]s.
//! Engines are expensive to start (they load model files, and may have to
//! download them first), so the process keeps exactly one, created on first
//! use by an [`EngineSession`].

use std::sync::Arc;

use tokio::sync::Mutex;

use super::detection::Detection;
use crate::{languages::LanguageSet, page_iter::Page, prelude::*};

pub mod models;
pub mod tesseract;

/// Interface to a recognition engine.
#[async_trait]
pub trait TextDetector: Send + Sync + 'static {
    /// Find and recognize text on a page. The order of the results is
    /// unspecified.
    async fn detect(&self, page: &Page) -> Result<Vec<Detection>>;
}

/// Builds a [`TextDetector`] for a set of languages.
#[async_trait]
pub trait EngineFactory: Send + Sync + 'static {
    async fn create(&self, languages: &LanguageSet) -> Result<Arc<dyn TextDetector>>;
}

/// A started engine, together with the languages it was started with.
#[derive(Clone)]
pub struct EngineHandle {
    languages: LanguageSet,
    detector: Arc<dyn TextDetector>,
}

impl EngineHandle {
    /// The languages this engine recognizes.
    pub fn languages(&self) -> &LanguageSet {
        &self.languages
    }

    /// Run the engine on a page.
    pub async fn detect(&self, page: &Page) -> Result<Vec<Detection>> {
        self.detector.detect(page).await
    }

    /// Do both handles refer to the same engine instance?
    pub fn same_engine(&self, other: &EngineHandle) -> bool {
        Arc::ptr_eq(&self.detector, &other.detector)
    }
}

/// Holds the one engine instance for the process.
///
/// The engine is created by the first [`EngineSession::acquire`] call, bound
/// to the languages that call asked for. Later calls get the same engine no
/// matter which languages they ask for. Switching languages means building a
/// new session.
pub struct EngineSession {
    factory: Box<dyn EngineFactory>,
    engine: Mutex<Option<EngineHandle>>,
}

impl EngineSession {
    pub fn new(factory: impl EngineFactory) -> Self {
        Self {
            factory: Box::new(factory),
            engine: Mutex::new(None),
        }
    }

    /// Get the engine, starting it if this is the first request.
    ///
    /// With no `languages`, a new engine uses [`LanguageSet::default`]. If
    /// starting the engine fails, nothing is cached and the next call tries
    /// again.
    #[instrument(level = "debug", skip_all)]
    pub async fn acquire(&self, languages: Option<&LanguageSet>) -> Result<EngineHandle> {
        // Hold the lock across construction so concurrent callers don't
        // start two engines.
        let mut engine = self.engine.lock().await;
        if let Some(handle) = engine.as_ref() {
            if let Some(requested) = languages
                && requested != handle.languages()
            {
                debug!(
                    requested = %requested,
                    active = %handle.languages(),
                    "Engine already started; ignoring language request"
                );
            }
            return Ok(handle.clone());
        }

        let languages = languages.cloned().unwrap_or_default();
        info!(languages = %languages, "Starting recognition engine");
        let detector = self
            .factory
            .create(&languages)
            .await
            .with_context(|| format!("failed to start recognition engine for {languages}"))?;
        let handle = EngineHandle {
            languages,
            detector,
        };
        *engine = Some(handle.clone());
        Ok(handle)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// A detector that returns canned detections for each page index.
    pub(crate) struct FakeDetector {
        pub(crate) pages: Vec<Result<Vec<Detection>, String>>,
    }

    #[async_trait]
    impl TextDetector for FakeDetector {
        async fn detect(&self, page: &Page) -> Result<Vec<Detection>> {
            match self.pages.get(page.index) {
                Some(Ok(detections)) => Ok(detections.clone()),
                Some(Err(msg)) => Err(anyhow!("{msg}")),
                None => Ok(vec![]),
            }
        }
    }

    /// A factory that counts how often it is asked to build an engine.
    pub(crate) struct FakeFactory {
        pub(crate) pages: Vec<Result<Vec<Detection>, String>>,
        pub(crate) created: Arc<AtomicUsize>,
        pub(crate) fail: bool,
    }

    impl FakeFactory {
        pub(crate) fn new(pages: Vec<Result<Vec<Detection>, String>>) -> Self {
            Self {
                pages,
                created: Arc::new(AtomicUsize::new(0)),
                fail: false,
            }
        }
    }

    #[async_trait]
    impl EngineFactory for FakeFactory {
        async fn create(&self, _languages: &LanguageSet) -> Result<Arc<dyn TextDetector>> {
            self.created.fetch_add(1, Ordering::SeqCst);
            // Give concurrent callers a chance to race us.
            tokio::task::yield_now().await;
            if self.fail {
                return Err(anyhow!("models unavailable"));
            }
            Ok(Arc::new(FakeDetector {
                pages: self.pages.clone(),
            }))
        }
    }

    #[tokio::test]
    async fn first_request_picks_languages_for_good() -> Result<()> {
        let factory = FakeFactory::new(vec![]);
        let created = factory.created.clone();
        let session = EngineSession::new(factory);

        let french = LanguageSet::from_requests(&["fr"])?;
        let first = session.acquire(french.as_ref()).await?;
        let german = LanguageSet::from_requests(&["de"])?;
        let second = session.acquire(german.as_ref()).await?;
        let third = session.acquire(None).await?;

        assert!(first.same_engine(&second));
        assert!(first.same_engine(&third));
        assert_eq!(second.languages().to_string(), "fr");
        assert_eq!(created.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test]
    async fn default_languages_are_used_without_a_request() -> Result<()> {
        let session = EngineSession::new(FakeFactory::new(vec![]));
        let handle = session.acquire(None).await?;
        assert_eq!(handle.languages(), &LanguageSet::default());
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_requests_build_one_engine() -> Result<()> {
        let factory = FakeFactory::new(vec![]);
        let created = factory.created.clone();
        let session = Arc::new(EngineSession::new(factory));

        let tasks = (0..8)
            .map(|_| {
                let session = session.clone();
                tokio::spawn(async move { session.acquire(None).await })
            })
            .collect::<Vec<_>>();
        let mut handles = vec![];
        for task in tasks {
            handles.push(task.await??);
        }

        assert_eq!(created.load(Ordering::SeqCst), 1);
        assert!(handles.iter().all(|h| h.same_engine(&handles[0])));
        Ok(())
    }

    #[tokio::test]
    async fn failed_start_is_not_cached() {
        let mut factory = FakeFactory::new(vec![]);
        factory.fail = true;
        let created = factory.created.clone();
        let session = EngineSession::new(factory);

        let err = session.acquire(None).await.err().expect("start should fail");
        assert!(format!("{err:#}").contains("models unavailable"));
        assert!(session.acquire(None).await.is_err());
        assert_eq!(created.load(Ordering::SeqCst), 2);
    }
}
