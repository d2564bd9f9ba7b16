use crate::claim::ClaimUid;
use crate::prepared::PreparedDevices;

/// Persists the runtime edits of prepared claims, e.g. as CDI spec files.
///
/// Both operations have to be idempotent, they are retried when a kubelet
/// redelivers a request.
pub trait ClaimEditWriter: Send {
    /// Fully qualified names under which the runtime finds the edits of
    /// `device` prepared for `claim_uid`.
    fn claim_device_ids(&self, claim_uid: &ClaimUid, device: &str) -> Vec<String>;

    fn write_claim_edits(
        &self,
        claim_uid: &ClaimUid,
        devices: &PreparedDevices,
    ) -> anyhow::Result<()>;

    fn delete_claim_edits(&self, claim_uid: &ClaimUid) -> anyhow::Result<()>;
}
