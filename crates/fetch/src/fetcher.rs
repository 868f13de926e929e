//! Fetch coordinator
//!
//! Drives one module version through resolve, admission, download,
//! extraction and assembly. Every attempt ends in exactly one status code
//! and, on success, a complete [`Module`] ready for the store.

use std::sync::Arc;
use std::time::{Duration, Instant};

use modsite_archive::module_prefix;
use modsite_config::{constants::MIB, Config};
use modsite_errors::{status, Error, FetchError};
use modsite_events::{
    AdmissionEvent, AppEvent, EventEmitter, EventSender, FailureContext, FetchEvent,
};
use modsite_licenses::Detector;
use modsite_proxy::ModuleSource;
use modsite_resources::{LoadShedder, ReleaseGuard, ZipLoadShedder};
use modsite_types::{
    version, FetchPhase, Module, ModuleInfo, PackageVersionState, Uuid, STDLIB_MODULE_PATH,
};

use crate::extract::{extract_packages, extract_readmes, ExtractLimits};
use crate::fetch_info::FetchInfoRegistry;
use crate::modfile::{self, Retraction};
use crate::units::assemble_units;

/// Outcome of one fetch attempt.
///
/// A successful result keeps the admission reservation until it is dropped
/// or [`FetchResult::release_admission`] is called, so the zip's share of
/// the in-flight budget stays reserved until the module has been stored.
/// Extraction holds its own share of the reservation, so a fetch that times
/// out keeps the budget until the blocking work behind it has finished.
#[derive(Debug)]
pub struct FetchResult {
    pub fetch_id: Uuid,
    pub module_path: String,
    pub requested_version: String,
    pub resolved_version: Option<String>,
    pub has_go_mod: bool,
    /// Module path declared by go.mod. Recorded even when it does not match.
    pub go_mod_path: Option<String>,
    pub status: u16,
    pub error: Option<Error>,
    /// Present only for 200 and 290.
    pub module: Option<Module>,
    pub package_version_states: Vec<PackageVersionState>,
    pub retractions: Vec<Retraction>,
    pub zip_size: Option<u64>,
    pub duration: Duration,
    guard: Option<Arc<ReleaseGuard>>,
}

impl FetchResult {
    fn new(fetch_id: Uuid, module_path: &str, requested_version: &str) -> Self {
        Self {
            fetch_id,
            module_path: module_path.to_string(),
            requested_version: requested_version.to_string(),
            resolved_version: None,
            has_go_mod: false,
            go_mod_path: None,
            status: status::OK,
            error: None,
            module: None,
            package_version_states: Vec::new(),
            retractions: Vec::new(),
            zip_size: None,
            duration: Duration::ZERO,
            guard: None,
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        status::is_success(self.status)
    }

    /// Version to record the outcome under: the resolved version when
    /// resolution succeeded, the requested one otherwise.
    #[must_use]
    pub fn version(&self) -> &str {
        self.resolved_version
            .as_deref()
            .unwrap_or(&self.requested_version)
    }

    #[must_use]
    pub fn holds_admission(&self) -> bool {
        self.guard.is_some()
    }

    /// Give up this result's share of the admission reservation. The bytes
    /// return to the budget once no extraction still holds them.
    pub fn release_admission(&mut self) {
        self.guard = None;
    }
}

/// Run `work` on the blocking pool, keeping `reservation` alive until the
/// work returns. Dropping the join handle detaches the work but not the
/// reservation.
fn spawn_reserved<T, F>(
    reservation: Option<Arc<ReleaseGuard>>,
    work: F,
) -> tokio::task::JoinHandle<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let _reservation = reservation;
        work()
    })
}

/// Phase a finished fetch ends in, given its status.
#[must_use]
pub fn terminal_phase(code: u16) -> FetchPhase {
    match code {
        c if status::is_success(c) => FetchPhase::Committed,
        status::SERVICE_UNAVAILABLE => FetchPhase::Shed,
        status::REQUEST_TIMEOUT | status::INTERNAL => FetchPhase::Failed,
        _ => FetchPhase::Rejected,
    }
}

/// Fetches module versions from a [`ModuleSource`].
pub struct Fetcher {
    source: Arc<dyn ModuleSource>,
    shedder: Option<Arc<dyn LoadShedder>>,
    limits: ExtractLimits,
    max_module_zip_size: u64,
    registry: Arc<FetchInfoRegistry>,
    tx: Option<EventSender>,
}

impl EventEmitter for Fetcher {
    fn event_sender(&self) -> Option<&EventSender> {
        self.tx.as_ref()
    }
}

impl Fetcher {
    /// A fetcher with default limits, no shedder and the global registry.
    pub fn new(source: Arc<dyn ModuleSource>) -> Self {
        Self {
            source,
            shedder: None,
            limits: ExtractLimits::default(),
            max_module_zip_size: modsite_config::FetchConfig::default().max_module_zip_size,
            registry: FetchInfoRegistry::global(),
            tx: None,
        }
    }

    /// Limits and shedder from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured build context is malformed.
    pub fn from_config(source: Arc<dyn ModuleSource>, config: &Config) -> Result<Self, Error> {
        let mut fetcher = Self::new(source)
            .with_limits(ExtractLimits::from_config(&config.fetch)?)
            .with_max_module_zip_size(config.fetch.max_module_zip_size);
        if let Some(max) = config.admission.max_in_flight_bytes() {
            fetcher = fetcher.with_shedder(Arc::new(ZipLoadShedder::new(max)));
        }
        Ok(fetcher)
    }

    #[must_use]
    pub fn with_shedder(mut self, shedder: Arc<dyn LoadShedder>) -> Self {
        self.shedder = Some(shedder);
        self
    }

    #[must_use]
    pub fn with_limits(mut self, limits: ExtractLimits) -> Self {
        self.limits = limits;
        self
    }

    #[must_use]
    pub fn with_max_module_zip_size(mut self, bytes: u64) -> Self {
        self.max_module_zip_size = bytes;
        self
    }

    #[must_use]
    pub fn with_registry(mut self, registry: Arc<FetchInfoRegistry>) -> Self {
        self.registry = registry;
        self
    }

    #[must_use]
    pub fn with_event_sender(mut self, tx: EventSender) -> Self {
        self.tx = Some(tx);
        self
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<FetchInfoRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn shedder(&self) -> Option<&Arc<dyn LoadShedder>> {
        self.shedder.as_ref()
    }

    /// Fetch and process one module version within `deadline`.
    ///
    /// Never fails: every problem is reported through the result's status
    /// and error. Any admission reservation is released before returning
    /// unless the fetch succeeded.
    pub async fn fetch_module(
        &self,
        module_path: &str,
        requested_version: &str,
        deadline: Duration,
    ) -> FetchResult {
        let started = Instant::now();
        let id = self.registry.start(module_path, requested_version);
        let mut fr = FetchResult::new(id, module_path, requested_version);
        self.enter(&fr, FetchPhase::Start);

        let timed = tokio::time::timeout(deadline, self.run(&mut fr)).await;
        let outcome = match timed {
            Ok(outcome) => outcome,
            Err(_) => {
                fr.package_version_states.clear();
                Err(FetchError::DeadlineExceeded {
                    seconds: deadline.as_secs(),
                }
                .into())
            }
        };
        if let Err(err) = outcome {
            fr.status = err.status_code();
            fr.module = None;
            fr.release_admission();
            fr.error = Some(err);
        }
        fr.duration = started.elapsed();

        let phase = terminal_phase(fr.status);
        self.registry.finish(
            id,
            phase,
            fr.status,
            fr.error.as_ref().map(ToString::to_string),
        );
        self.enter(&fr, phase);
        self.report(&fr, phase);
        fr
    }

    fn enter(&self, fr: &FetchResult, phase: FetchPhase) {
        self.registry.update_phase(fr.fetch_id, phase);
        self.emit_fetch_phase(fr.fetch_id.to_string(), &fr.module_path, fr.version(), phase);
    }

    fn report(&self, fr: &FetchResult, phase: FetchPhase) {
        for state in fr.package_version_states.iter().filter(|s| s.status != status::OK) {
            self.emit(AppEvent::Fetch(FetchEvent::PackageSkipped {
                module_path: state.module_path.clone(),
                version: state.version.clone(),
                package_path: state.package_path.clone(),
                status: state.status,
                reason: state.error.clone().unwrap_or_default(),
            }));
        }
        let packages = fr.module.as_ref().map_or(0, |m| m.packages().count());
        let incomplete = fr
            .package_version_states
            .iter()
            .filter(|s| s.status != status::OK)
            .count();
        self.emit(AppEvent::Fetch(FetchEvent::Completed {
            fetch_id: fr.fetch_id.to_string(),
            module_path: fr.module_path.clone(),
            requested_version: fr.requested_version.clone(),
            resolved_version: fr.resolved_version.clone(),
            status: fr.status,
            size_bytes: fr.zip_size,
            duration_ms: u64::try_from(fr.duration.as_millis()).unwrap_or(u64::MAX),
            packages,
            incomplete_packages: incomplete,
        }));
        if phase == FetchPhase::Failed {
            if let Some(err) = &fr.error {
                self.emit(AppEvent::Fetch(FetchEvent::Failed {
                    fetch_id: fr.fetch_id.to_string(),
                    module_path: fr.module_path.clone(),
                    version: fr.version().to_string(),
                    status: fr.status,
                    failure: FailureContext::from_error(err),
                }));
            }
        }
    }

    /// Reserve `size` bytes with the shedder, if one is configured.
    fn admit(&self, fr: &mut FetchResult, version: &str, size: u64) -> Result<(), FetchError> {
        let Some(shedder) = &self.shedder else {
            return Ok(());
        };
        let admission = shedder.should_shed(size);
        let size_in_flight = shedder.stats().size_in_flight;
        if admission.shed {
            admission.guard.release();
            self.emit(AppEvent::Admission(AdmissionEvent::Shed {
                module_path: fr.module_path.clone(),
                version: version.to_string(),
                size_bytes: size,
                size_in_flight,
            }));
            return Err(FetchError::SheddingLoad {
                size_mib: size / MIB,
            });
        }
        fr.guard = Some(Arc::new(admission.guard));
        self.emit(AppEvent::Admission(AdmissionEvent::Admitted {
            module_path: fr.module_path.clone(),
            version: version.to_string(),
            size_bytes: size,
            size_in_flight,
        }));
        Ok(())
    }

    async fn run(&self, fr: &mut FetchResult) -> Result<(), Error> {
        let id = fr.fetch_id;
        let module_path = fr.module_path.clone();
        if module_path.is_empty() || fr.requested_version.is_empty() {
            return Err(FetchError::InvalidArgument {
                message: "module path and version are required".to_string(),
            }
            .into());
        }

        self.enter(fr, FetchPhase::Resolving);
        let info = self
            .source
            .resolve_version(&module_path, &fr.requested_version)
            .await?;
        let version = info.version.clone();
        fr.resolved_version = Some(version.clone());
        self.registry.update(id, |i| i.version.clone_from(&version));

        self.enter(fr, FetchPhase::AdmissionCheck);
        let size = self.source.zip_size(&module_path, &version).await?;
        fr.zip_size = Some(size);
        self.registry.update(id, |i| i.zip_size = Some(size));
        self.admit(fr, &version, size)?;
        if size > self.max_module_zip_size {
            tracing::warn!(
                module_path = %module_path,
                version = %version,
                size_mib = size / MIB,
                max_mib = self.max_module_zip_size / MIB,
                "zip size exceeds max"
            );
            return Err(FetchError::ModuleTooLarge {
                size_mib: size / MIB,
                max_mib: self.max_module_zip_size / MIB,
            }
            .into());
        }

        self.enter(fr, FetchPhase::Downloading);
        let zip = self.source.fetch_zip(&module_path, &version).await?;
        let is_stdlib = module_path == STDLIB_MODULE_PATH;
        fr.has_go_mod = is_stdlib
            || zip.contains(&format!("{}go.mod", module_prefix(&module_path, &version)));

        let mod_file = if is_stdlib {
            fr.go_mod_path = Some(STDLIB_MODULE_PATH.to_string());
            None
        } else {
            match self.source.fetch_mod(&module_path, &version).await? {
                Some(contents) => {
                    let declared = modfile::module_path(&contents)
                        .ok_or_else(|| FetchError::bad_module("go.mod has no module path"))?;
                    fr.go_mod_path = Some(declared.clone());
                    if declared != module_path {
                        return Err(FetchError::AlternativeModule {
                            module_path,
                            go_mod_path: declared,
                        }
                        .into());
                    }
                    Some(modfile::parse(&contents)?)
                }
                None => {
                    fr.go_mod_path = Some(module_path.clone());
                    None
                }
            }
        };

        self.enter(fr, FetchPhase::Extracting);
        let limits = self.limits.clone();
        let (mp, v) = (module_path.clone(), version.clone());
        let (detector, readmes, extraction) = spawn_reserved(fr.guard.clone(), move || {
            let detector = Detector::new(&mp, &v, &zip);
            let readmes = extract_readmes(&mp, &v, &zip, limits.max_file_size);
            extract_packages(&mp, &v, &zip, &detector, &limits)
                .map(|extraction| (detector, readmes, extraction))
        })
        .await
        .map_err(|e| FetchError::internal(format!("extraction task failed: {e}")))??;

        fr.package_version_states.clone_from(&extraction.states);
        extraction.ensure_packages()?;

        self.enter(fr, FetchPhase::Assembling);
        let version_type = version::version_type(&version).ok_or_else(|| {
            FetchError::internal(format!("resolved version {version} is not a valid version"))
        })?;
        let incomplete = extraction.has_incomplete_packages();
        let failed = extraction.failed_paths();
        let units = assemble_units(
            &module_path,
            &version,
            extraction.packages,
            &readmes,
            &failed,
            &detector,
        );
        let deprecated_comment = mod_file.as_ref().and_then(|m| m.deprecated.clone());
        fr.retractions = mod_file.map(|m| m.retracted).unwrap_or_default();
        fr.module = Some(Module {
            info: ModuleInfo {
                module_path,
                version,
                commit_time: info.time,
                version_type,
                is_redistributable: detector.is_module_redistributable(),
                has_go_mod: fr.has_go_mod,
                deprecated_comment,
            },
            licenses: detector.all_licenses().to_vec(),
            units,
        });
        fr.status = if incomplete {
            status::HAS_INCOMPLETE_PACKAGES
        } else {
            status::OK
        };
        Ok(())
    }
}
