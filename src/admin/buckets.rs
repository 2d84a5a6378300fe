use chrono::Utc;
use serde_json::json;

use super::validation::validate_bucket_name;
use super::{AdminService, Applied};
use crate::audit::AuditEntry;
use crate::error::{Error, Result};
use crate::types::{BucketAssignment, BucketGrantee, Principal};

impl AdminService {
    fn ensure_grantee_exists(&self, grantee: &BucketGrantee) -> Result<()> {
        let exists = match grantee {
            BucketGrantee::Group(id) => self.store.get_group(id)?.is_some(),
            BucketGrantee::Principal(id) => self.store.get_principal(id)?.is_some(),
        };
        if exists { Ok(()) } else { Err(Error::NotFound) }
    }

    /// Adds `bucket` to the grantee's allow-list.
    pub fn assign_bucket(
        &self,
        actor: &Principal,
        grantee: &BucketGrantee,
        bucket: &str,
    ) -> Result<BucketAssignment> {
        self.apply(actor, || {
            validate_bucket_name(bucket)?;
            self.ensure_grantee_exists(grantee)?;

            let assignment = BucketAssignment {
                grantee: grantee.clone(),
                bucket: bucket.to_string(),
                created_at: Utc::now(),
            };
            self.store.add_bucket_assignment(&assignment)?;

            let entry = AuditEntry::new(
                "bucket.assign",
                grantee.resource_tag(),
                json!({ "bucket": bucket }),
            );
            Ok(Applied::changed(assignment, entry))
        })
    }

    /// Returns false when the grantee had no such assignment.
    pub fn unassign_bucket(
        &self,
        actor: &Principal,
        grantee: &BucketGrantee,
        bucket: &str,
    ) -> Result<bool> {
        self.apply(actor, || {
            if !self.store.remove_bucket_assignment(grantee, bucket)? {
                return Ok(Applied::unchanged(false));
            }

            let entry = AuditEntry::new(
                "bucket.unassign",
                grantee.resource_tag(),
                json!({ "bucket": bucket }),
            );
            Ok(Applied::changed(true, entry))
        })
    }

    pub fn list_bucket_assignments(
        &self,
        actor: &Principal,
        grantee: &BucketGrantee,
    ) -> Result<Vec<String>> {
        self.read(actor, || {
            self.ensure_grantee_exists(grantee)?;
            self.store.list_bucket_assignments(grantee)
        })
    }
}
