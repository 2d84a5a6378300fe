use chrono::Utc;
use serde_json::json;

use super::validation::{parse_access, validate_group_name, validate_id, validate_resource};
use super::{AdminService, Applied};
use crate::audit::AuditEntry;
use crate::error::{Error, Result};
use crate::types::{
    BucketGrantee, Group, GroupDetail, GroupPermission, GroupRemoval, Membership, Principal,
};

fn group_resource(id: &str) -> String {
    format!("group:{id}")
}

impl AdminService {
    pub fn create_group(&self, actor: &Principal, name: &str) -> Result<Group> {
        self.apply(actor, || {
            validate_group_name(name)?;

            let group = Group {
                id: uuid::Uuid::new_v4().to_string(),
                name: name.trim().to_string(),
                created_at: Utc::now(),
            };
            self.store.create_group(&group)?;

            let entry = AuditEntry::new(
                "group.create",
                group_resource(&group.id),
                json!({ "name": group.name }),
            );
            Ok(Applied::changed(group, entry))
        })
    }

    /// Deletes the group with its permissions, memberships and bucket
    /// assignments. Principals and buckets are untouched.
    pub fn delete_group(&self, actor: &Principal, id: &str) -> Result<GroupRemoval> {
        self.apply(actor, || {
            let group = self.store.get_group(id)?.ok_or(Error::NotFound)?;
            let removal = self.store.delete_group(id)?.ok_or(Error::NotFound)?;

            let entry = AuditEntry::new(
                "group.delete",
                group_resource(id),
                json!({
                    "name": group.name,
                    "permissions": removal.permissions,
                    "members": removal.members,
                    "buckets": removal.buckets,
                }),
            );
            Ok(Applied::changed(removal, entry))
        })
    }

    /// Grants `access` on `resource` to the group, replacing any existing
    /// level for the same resource.
    pub fn set_permission(
        &self,
        actor: &Principal,
        group_id: &str,
        resource: &str,
        access: &str,
    ) -> Result<GroupPermission> {
        self.apply(actor, || {
            validate_resource(resource)?;
            let access = parse_access(access)?;
            self.store.get_group(group_id)?.ok_or(Error::NotFound)?;

            let change = self
                .store
                .upsert_group_permission(group_id, resource, access)?;

            let entry = AuditEntry::new(
                "permission.set",
                group_resource(group_id),
                json!({
                    "permission_id": change.permission.id,
                    "resource": change.permission.resource,
                    "access": change.permission.access,
                    "previous": change.previous,
                }),
            );
            Ok(Applied::changed(change.permission, entry))
        })
    }

    /// Returns false when the group holds no such permission.
    pub fn remove_permission(
        &self,
        actor: &Principal,
        group_id: &str,
        permission_id: i64,
    ) -> Result<bool> {
        self.apply(actor, || {
            let Some(permission) = self
                .store
                .get_group_permission(permission_id)?
                .filter(|p| p.group_id == group_id)
            else {
                return Ok(Applied::unchanged(false));
            };

            if !self.store.delete_group_permission(permission_id)? {
                return Ok(Applied::unchanged(false));
            }

            let entry = AuditEntry::new(
                "permission.remove",
                group_resource(group_id),
                json!({
                    "permission_id": permission.id,
                    "resource": permission.resource,
                    "access": permission.access,
                }),
            );
            Ok(Applied::changed(true, entry))
        })
    }

    pub fn add_member(
        &self,
        actor: &Principal,
        group_id: &str,
        principal_id: &str,
    ) -> Result<Membership> {
        self.apply(actor, || {
            validate_id(group_id, "group_id")?;
            validate_id(principal_id, "principal_id")?;
            self.store.get_group(group_id)?.ok_or(Error::NotFound)?;
            self.store.get_principal(principal_id)?.ok_or(Error::NotFound)?;

            let membership = Membership {
                principal_id: principal_id.to_string(),
                group_id: group_id.to_string(),
                created_at: Utc::now(),
            };
            self.store.add_membership(&membership)?;

            let entry = AuditEntry::new(
                "membership.add",
                group_resource(group_id),
                json!({ "principal_id": principal_id }),
            );
            Ok(Applied::changed(membership, entry))
        })
    }

    /// Returns false when the principal was not a member.
    pub fn remove_member(
        &self,
        actor: &Principal,
        group_id: &str,
        principal_id: &str,
    ) -> Result<bool> {
        self.apply(actor, || {
            if !self.store.remove_membership(principal_id, group_id)? {
                return Ok(Applied::unchanged(false));
            }

            let entry = AuditEntry::new(
                "membership.remove",
                group_resource(group_id),
                json!({ "principal_id": principal_id }),
            );
            Ok(Applied::changed(true, entry))
        })
    }

    pub fn list_groups(&self, actor: &Principal) -> Result<Vec<Group>> {
        self.read(actor, || self.store.list_groups())
    }

    pub fn group_detail(&self, actor: &Principal, id: &str) -> Result<GroupDetail> {
        self.read(actor, || {
            let group = self.store.get_group(id)?.ok_or(Error::NotFound)?;
            Ok(GroupDetail {
                members: self.store.list_group_members(id)?,
                permissions: self.store.list_group_permissions(id)?,
                buckets: self
                    .store
                    .list_bucket_assignments(&BucketGrantee::Group(id.to_string()))?,
                group,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::admin::testing::Fixture;
    use crate::error::Error;
    use crate::store::Store;
    use crate::types::{AccessLevel, BucketGrantee};

    #[test]
    fn test_create_group_audits_and_rejects_duplicates() {
        let f = Fixture::new();
        let group = f.admin.create_group(&f.root, "editors").unwrap();

        let events = f.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action, "group.create");
        assert_eq!(events[0].resource, format!("group:{}", group.id));
        assert_eq!(events[0].principal_id.as_deref(), Some("root"));
        assert_eq!(events[0].details["name"], "editors");

        let duplicate = f.admin.create_group(&f.root, "editors");
        assert!(matches!(duplicate, Err(Error::Conflict(_))));
        assert_eq!(f.store.list_groups().unwrap().len(), 1);
        assert_eq!(f.events().len(), 1);
    }

    #[test]
    fn test_empty_group_name_is_bad_request() {
        let f = Fixture::new();
        assert!(matches!(
            f.admin.create_group(&f.root, ""),
            Err(Error::BadRequest(_))
        ));
    }

    #[test]
    fn test_non_admin_is_forbidden_everywhere() {
        let f = Fixture::new();
        let alice = f.user("alice");
        let group = f.admin.create_group(&f.root, "editors").unwrap();

        assert!(matches!(
            f.admin.create_group(&alice, "mine"),
            Err(Error::Forbidden)
        ));
        assert!(matches!(
            f.admin.delete_group(&alice, &group.id),
            Err(Error::Forbidden)
        ));
        assert!(matches!(
            f.admin.set_permission(&alice, &group.id, "file", "write"),
            Err(Error::Forbidden)
        ));
        assert!(matches!(
            f.admin.add_member(&alice, &group.id, &alice.id),
            Err(Error::Forbidden)
        ));
        assert!(matches!(
            f.admin.remove_member(&alice, &group.id, &alice.id),
            Err(Error::Forbidden)
        ));
        assert!(matches!(f.admin.list_groups(&alice), Err(Error::Forbidden)));
        assert_eq!(f.events().len(), 1);
    }

    #[test]
    fn test_set_permission_updates_in_place() {
        let f = Fixture::new();
        let group = f.admin.create_group(&f.root, "ops").unwrap();

        let first = f.admin.set_permission(&f.root, &group.id, "r", "read").unwrap();
        let second = f.admin.set_permission(&f.root, &group.id, "r", "write").unwrap();

        assert_eq!(first.id, second.id);
        let rows = f.store.list_group_permissions(&group.id).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].access, AccessLevel::Write);

        let events = f.events();
        assert_eq!(events[0].action, "permission.set");
        assert_eq!(events[0].details["access"], "write");
        assert_eq!(events[0].details["previous"], "read");
        assert!(events[1].details["previous"].is_null());
    }

    #[test]
    fn test_set_permission_validates_input() {
        let f = Fixture::new();
        let group = f.admin.create_group(&f.root, "ops").unwrap();

        assert!(matches!(
            f.admin.set_permission(&f.root, &group.id, "", "read"),
            Err(Error::BadRequest(_))
        ));
        assert!(matches!(
            f.admin.set_permission(&f.root, &group.id, "file", "everything"),
            Err(Error::BadRequest(_))
        ));
        assert!(matches!(
            f.admin.set_permission(&f.root, "missing", "file", "read"),
            Err(Error::NotFound)
        ));
    }

    #[test]
    fn test_remove_permission_is_noop_when_absent() {
        let f = Fixture::new();
        let group = f.admin.create_group(&f.root, "ops").unwrap();
        let permission = f.admin.set_permission(&f.root, &group.id, "file", "read").unwrap();

        assert!(f.admin.remove_permission(&f.root, &group.id, permission.id).unwrap());
        let after_remove = f.events().len();

        assert!(!f.admin.remove_permission(&f.root, &group.id, permission.id).unwrap());
        assert!(!f.admin.remove_permission(&f.root, &group.id, 9999).unwrap());
        assert_eq!(f.events().len(), after_remove);
        assert_eq!(f.events()[0].action, "permission.remove");
    }

    #[test]
    fn test_remove_permission_ignores_other_groups_rows() {
        let f = Fixture::new();
        let ops = f.admin.create_group(&f.root, "ops").unwrap();
        let dev = f.admin.create_group(&f.root, "dev").unwrap();
        let permission = f.admin.set_permission(&f.root, &ops.id, "file", "read").unwrap();

        assert!(!f.admin.remove_permission(&f.root, &dev.id, permission.id).unwrap());
        assert_eq!(f.store.list_group_permissions(&ops.id).unwrap().len(), 1);
    }

    #[test]
    fn test_membership_lifecycle() {
        let f = Fixture::new();
        let alice = f.user("alice");
        let group = f.admin.create_group(&f.root, "editors").unwrap();

        f.admin.add_member(&f.root, &group.id, &alice.id).unwrap();
        assert!(matches!(
            f.admin.add_member(&f.root, &group.id, &alice.id),
            Err(Error::Conflict(_))
        ));
        assert!(matches!(
            f.admin.add_member(&f.root, &group.id, "ghost"),
            Err(Error::NotFound)
        ));
        assert!(matches!(
            f.admin.add_member(&f.root, "", &alice.id),
            Err(Error::BadRequest(_))
        ));

        assert!(f.admin.remove_member(&f.root, &group.id, &alice.id).unwrap());
        assert!(!f.admin.remove_member(&f.root, &group.id, &alice.id).unwrap());

        let actions: Vec<_> = f.events().iter().map(|e| e.action.clone()).collect();
        assert_eq!(actions, ["membership.remove", "membership.add", "group.create"]);
    }

    #[test]
    fn test_delete_group_cascades() {
        let f = Fixture::new();
        let alice = f.user("alice");
        let group = f.admin.create_group(&f.root, "editors").unwrap();
        f.admin.set_permission(&f.root, &group.id, "file", "write").unwrap();
        f.admin.add_member(&f.root, &group.id, &alice.id).unwrap();
        f.admin
            .assign_bucket(&f.root, &BucketGrantee::Group(group.id.clone()), "reports")
            .unwrap();

        let removal = f.admin.delete_group(&f.root, &group.id).unwrap();
        assert_eq!(removal.permissions, 1);
        assert_eq!(removal.members, 1);
        assert_eq!(removal.buckets, 1);

        assert!(f.store.get_group(&group.id).unwrap().is_none());
        assert!(f.store.list_principal_groups(&alice.id).unwrap().is_empty());
        assert!(f.store.list_principal_permissions(&alice.id).unwrap().is_empty());
        assert!(f.store.get_principal(&alice.id).unwrap().is_some());

        let event = &f.events()[0];
        assert_eq!(event.action, "group.delete");
        assert_eq!(event.details["name"], "editors");
    }

    #[test]
    fn test_delete_missing_group_is_not_found() {
        let f = Fixture::new();
        f.admin.create_group(&f.root, "editors").unwrap();

        assert!(matches!(
            f.admin.delete_group(&f.root, "missing"),
            Err(Error::NotFound)
        ));
        assert_eq!(f.store.list_groups().unwrap().len(), 1);
    }

    #[test]
    fn test_group_detail() {
        let f = Fixture::new();
        let alice = f.user("alice");
        let group = f.admin.create_group(&f.root, "editors").unwrap();
        f.admin.set_permission(&f.root, &group.id, "file", "write").unwrap();
        f.admin.add_member(&f.root, &group.id, &alice.id).unwrap();

        let detail = f.admin.group_detail(&f.root, &group.id).unwrap();
        assert_eq!(detail.group.name, "editors");
        assert_eq!(detail.members.len(), 1);
        assert_eq!(detail.permissions.len(), 1);
        assert!(detail.buckets.is_empty());

        assert!(matches!(
            f.admin.group_detail(&f.root, "missing"),
            Err(Error::NotFound)
        ));
    }

    #[test]
    fn test_editors_scenario() {
        let f = Fixture::new();
        let u = f.user("u");
        let editors = f.admin.create_group(&f.root, "editors").unwrap();
        f.admin.set_permission(&f.root, &editors.id, "file", "write").unwrap();
        f.admin.add_member(&f.root, &editors.id, &u.id).unwrap();

        assert!(f.authz.is_allowed(&u, "file", AccessLevel::Write).unwrap());

        f.admin.remove_member(&f.root, &editors.id, &u.id).unwrap();
        assert!(!f.authz.is_allowed(&u, "file", AccessLevel::Write).unwrap());
    }
}
