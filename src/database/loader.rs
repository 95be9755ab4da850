//! Row decoding into records.
//!
//! Decoded records are marked loaded; they came from the database.

use std::marker::PhantomData;

use super::value::SqlRow;
use crate::error::StoreError;
use crate::record::{CommentRecord, KickRecord, PlayerRecord, ScopeKind, ScopedRecord, Status};

pub trait FromRow: Sized {
    fn from_row(row: &SqlRow) -> Result<Self, StoreError>;
}

impl FromRow for PlayerRecord {
    fn from_row(row: &SqlRow) -> Result<Self, StoreError> {
        Ok(Self {
            uuid: row.uuid("uuid")?,
            username: row.text("username")?,
            first_join: row.timestamp("firstJoin")?,
            last_join: row.timestamp("lastJoin")?,
            last_leave: row.opt_timestamp("lastLeave")?,
            playtime: row.int("playtime")?,
            total_joins: row.int("totalJoins")?,
            last_server: row.opt_text("lastServer")?,
            last_address: row.opt_text("lastIP")?,
            loaded: true,
        })
    }
}

impl<K: ScopeKind> FromRow for ScopedRecord<K> {
    fn from_row(row: &SqlRow) -> Result<Self, StoreError> {
        let status = row.text("status")?;
        let status = Status::from_str(&status)
            .ok_or_else(|| StoreError::decode("status", format!("unknown status `{status}`")))?;

        Ok(Self {
            id: row.int("id")?,
            status,
            player: row.opt_uuid("playerUuid")?,
            staff: row.opt_uuid("staffUuid")?,
            terminating_staff: row.opt_uuid(K::TERMINATING_STAFF)?,
            issued_at: row.timestamp(K::ISSUED_AT)?,
            terminated_at: row.opt_timestamp(K::TERMINATED_AT)?,
            address: row.opt_text("playerIP")?,
            context: row.opt_text("contexts")?,
            reason: row.opt_text("reason")?,
            termination_reason: row.opt_text(K::TERMINATION_REASON)?,
            loaded: true,
            kind: PhantomData,
        })
    }
}

impl FromRow for KickRecord {
    fn from_row(row: &SqlRow) -> Result<Self, StoreError> {
        Ok(Self {
            id: row.int("id")?,
            player: row.uuid("playerUuid")?,
            staff: row.opt_uuid("staffUuid")?,
            kicked_at: row.timestamp("kickDate")?,
            global: row.bool("isGlobal")?,
            reason: row.opt_text("reason")?,
            loaded: true,
        })
    }
}

impl FromRow for CommentRecord {
    fn from_row(row: &SqlRow) -> Result<Self, StoreError> {
        Ok(Self {
            id: row.int("id")?,
            player: row.uuid("playerUuid")?,
            staff: row.opt_uuid("staffUuid")?,
            added_at: row.timestamp("dateAdded")?,
            warning: row.bool("isWarning")?,
            comment: row.text("comment")?,
            loaded: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::value::SqlValue;
    use crate::record::{BanRecord, Record};

    #[test]
    fn test_ban_row_uses_kind_columns() {
        let row = SqlRow::new(
            [
                "id", "status", "playerUuid", "staffUuid", "unbanStaffUuid", "playerIP", "banDate",
                "unbanDate", "contexts", "reason", "unbanReason",
            ]
            .map(String::from)
            .to_vec(),
            vec![
                SqlValue::Int(7),
                SqlValue::text("ended"),
                SqlValue::Text(None),
                SqlValue::Text(None),
                SqlValue::text("5b0f3e4e-64f4-4a51-9e38-0d0a6ce1a2b7"),
                SqlValue::text("10.2.2.2"),
                SqlValue::text("2024-03-01 12:00:00"),
                SqlValue::text("2024-03-02 12:00:00"),
                SqlValue::text("arena"),
                SqlValue::text("alt account"),
                SqlValue::text("appeal accepted"),
            ],
        );

        let ban = BanRecord::from_row(&row).unwrap();

        assert!(ban.is_loaded());
        assert_eq!(ban.status(), Status::Ended);
        assert_eq!(ban.player(), None);
        assert!(ban.terminating_staff().is_some());
        assert_eq!(ban.termination_reason(), Some("appeal accepted"));
    }

    #[test]
    fn test_unknown_status_is_decode_error() {
        let row = SqlRow::new(vec!["status".into()], vec![SqlValue::text("Paused")]);
        assert!(matches!(
            BanRecord::from_row(&row),
            Err(StoreError::Decode { .. })
        ));
    }
}
