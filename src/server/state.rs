use crate::classification::ZeroShotBackend;
use crate::languages::LanguageDetector;
use crate::pipeline::Pipeline;
use crate::translation::TranslationBackend;

/// Shared by every request; the pipeline holds no per-request state.
pub(crate) struct ServerState<D, T, C>
where
    D: LanguageDetector,
    T: TranslationBackend,
    C: ZeroShotBackend,
{
    pub(crate) pipeline: Pipeline<D, T, C>,
}
