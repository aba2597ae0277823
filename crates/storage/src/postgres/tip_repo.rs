//! Tip record repository implementation for PostgreSQL.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, instrument};

use tipjar_core::error::{StorageError, StorageResult};
use tipjar_core::models::{PayerId, TipRecord};
use tipjar_core::ports::TipRecordStore;

use super::database::Database;
use super::helpers::{bytes_to_address, bytes_to_tx_hash, text_to_decimal, text_to_u256};

/// PostgreSQL implementation of TipRecordStore.
pub struct PgTipRecordStore {
    pool: PgPool,
}

impl PgTipRecordStore {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
        }
    }

    /// Most recent tips sent by `payer`, newest first.
    #[instrument(skip(self, payer), fields(payer = %payer))]
    pub async fn list_tips_for_payer(
        &self,
        payer: &PayerId,
        limit: u32,
    ) -> StorageResult<Vec<TipRecord>> {
        let rows = sqlx::query_as::<_, TipRow>(
            r#"
            SELECT id, payer, currency_id, usd_amount::TEXT, amount::TEXT,
                   amount_per_recipient::TEXT, tx_hashes, created_at
            FROM tip_records
            WHERE payer = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(&payer.0)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::QueryError(e.to_string()))?;

        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let recipient_rows = sqlx::query_as::<_, RecipientRow>(
            r#"
            SELECT tip_id, address
            FROM tip_recipients
            WHERE tip_id = ANY($1)
            ORDER BY tip_id, position
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::QueryError(e.to_string()))?;

        let mut recipients: HashMap<i64, Vec<Vec<u8>>> = HashMap::new();
        for row in recipient_rows {
            recipients.entry(row.tip_id).or_default().push(row.address);
        }

        debug!(count = rows.len(), "Loaded tip records");

        rows.into_iter()
            .map(|row| {
                let addresses = recipients.remove(&row.id).unwrap_or_default();
                row.into_record(addresses)
            })
            .collect()
    }
}

#[async_trait]
impl TipRecordStore for PgTipRecordStore {
    #[instrument(skip_all, fields(payer = %record.payer, recipients = record.recipients.len()))]
    async fn save_tip_record(&self, record: &TipRecord) -> StorageResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::TransactionError(e.to_string()))?;

        let tx_hashes: Vec<Vec<u8>> = record.tx_hashes.iter().map(|h| h.to_vec()).collect();

        let (tip_id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO tip_records (
                payer, currency_id, usd_amount, amount, amount_per_recipient,
                tx_hashes, created_at
            )
            VALUES ($1, $2, $3::NUMERIC, $4::NUMERIC, $5::NUMERIC, $6, $7)
            RETURNING id
            "#,
        )
        .bind(&record.payer.0)
        .bind(&record.currency_id)
        .bind(record.usd_amount.to_string())
        .bind(record.amount.to_string())
        .bind(record.amount_per_recipient.to_string())
        .bind(&tx_hashes)
        .bind(record.created_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| StorageError::QueryError(e.to_string()))?;

        for (position, address) in record.recipients.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO tip_recipients (tip_id, position, address)
                VALUES ($1, $2, $3)
                "#,
            )
            .bind(tip_id)
            .bind(position as i32)
            .bind(address.as_slice())
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::QueryError(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| StorageError::TransactionError(e.to_string()))?;

        debug!(tip_id, "Tip record saved");
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct TipRow {
    id: i64,
    payer: String,
    currency_id: String,
    usd_amount: String,
    amount: String,
    amount_per_recipient: String,
    tx_hashes: Vec<Vec<u8>>,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl TipRow {
    fn into_record(self, addresses: Vec<Vec<u8>>) -> StorageResult<TipRecord> {
        let recipients = addresses
            .into_iter()
            .map(|a| bytes_to_address(a, "tip.recipient"))
            .collect::<StorageResult<Vec<_>>>()?;
        let tx_hashes = self
            .tx_hashes
            .into_iter()
            .map(|h| bytes_to_tx_hash(h, "tip.tx_hash"))
            .collect::<StorageResult<Vec<_>>>()?;

        Ok(TipRecord {
            payer: PayerId(self.payer),
            recipients,
            usd_amount: text_to_decimal(&self.usd_amount, "tip.usd_amount")?,
            currency_id: self.currency_id,
            amount: text_to_u256(&self.amount, "tip.amount")?,
            amount_per_recipient: text_to_u256(
                &self.amount_per_recipient,
                "tip.amount_per_recipient",
            )?,
            tx_hashes,
            created_at: self.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct RecipientRow {
    tip_id: i64,
    address: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, B256, U256};
    use rust_decimal_macros::dec;

    fn row() -> TipRow {
        TipRow {
            id: 7,
            payer: "alice".into(),
            currency_id: "usdc".into(),
            usd_amount: "2.00".into(),
            amount: "2000000".into(),
            amount_per_recipient: "1000000".into(),
            tx_hashes: vec![B256::repeat_byte(1).to_vec()],
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_row_into_record() {
        let addresses = vec![
            Address::repeat_byte(1).to_vec(),
            Address::repeat_byte(2).to_vec(),
        ];
        let record = row().into_record(addresses).unwrap();
        assert_eq!(record.payer, PayerId::from("alice"));
        assert_eq!(record.usd_amount, dec!(2.00));
        assert_eq!(record.amount, U256::from(2_000_000u64));
        assert_eq!(
            record.recipients,
            vec![Address::repeat_byte(1), Address::repeat_byte(2)]
        );
        assert_eq!(record.tx_hashes, vec![B256::repeat_byte(1)]);
    }

    // Critical: a corrupt column surfaces as an error, never a default
    #[test]
    fn test_row_with_corrupt_amount_fails() {
        let mut bad = row();
        bad.amount = "not-a-number".into();
        let err = bad.into_record(Vec::new()).unwrap_err();
        assert!(err.to_string().contains("tip.amount"));
    }
}
