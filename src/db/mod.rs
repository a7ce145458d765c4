pub mod models;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use self::models::{Alert, AlertRecord, DeviceThresholdConfig, SensorReading};
use crate::ports::{AlertRepository, AlertSink, ConfigStore, ReadingStore, RecipientResolver};

pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;
    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// PgStore
// ---------------------------------------------------------------------------

const ALERT_COLUMNS: &str = "id, device_id, message, severity, gas, temp, humidity, flame, \
                             time, location, email, acknowledged, acknowledged_at, acknowledged_by";

/// Postgres-backed implementation of every storage port.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConfigStore for PgStore {
    async fn get_config(&self, device_id: &str) -> Result<Option<DeviceThresholdConfig>> {
        sqlx::query_as::<_, DeviceThresholdConfig>(
            r#"
            SELECT s.device_id,
                   s.gas_warning_threshold, s.gas_danger_threshold,
                   s.temp_warning_threshold, s.temp_danger_threshold,
                   s.humidity_warning_threshold, s.humidity_danger_threshold,
                   s.enable_gas_alerts, s.enable_temp_alerts, s.enable_flame_alerts,
                   s.alert_cooldown_seconds,
                   d.location
            FROM device_settings s
            LEFT JOIN devices d ON d.device_id = s.device_id
            WHERE s.device_id = $1
            "#,
        )
        .bind(device_id)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("failed to load device_settings for {device_id}"))
    }

    async fn upsert_config(&self, c: &DeviceThresholdConfig) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO device_settings
                (device_id,
                 gas_warning_threshold, gas_danger_threshold,
                 temp_warning_threshold, temp_danger_threshold,
                 humidity_warning_threshold, humidity_danger_threshold,
                 enable_gas_alerts, enable_temp_alerts, enable_flame_alerts,
                 alert_cooldown_seconds)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (device_id) DO UPDATE SET
                gas_warning_threshold      = EXCLUDED.gas_warning_threshold,
                gas_danger_threshold       = EXCLUDED.gas_danger_threshold,
                temp_warning_threshold     = EXCLUDED.temp_warning_threshold,
                temp_danger_threshold      = EXCLUDED.temp_danger_threshold,
                humidity_warning_threshold = EXCLUDED.humidity_warning_threshold,
                humidity_danger_threshold  = EXCLUDED.humidity_danger_threshold,
                enable_gas_alerts          = EXCLUDED.enable_gas_alerts,
                enable_temp_alerts         = EXCLUDED.enable_temp_alerts,
                enable_flame_alerts        = EXCLUDED.enable_flame_alerts,
                alert_cooldown_seconds     = EXCLUDED.alert_cooldown_seconds,
                updated_at                 = now()
            "#,
        )
        .bind(&c.device_id)
        .bind(c.gas_warning_threshold)
        .bind(c.gas_danger_threshold)
        .bind(c.temp_warning_threshold)
        .bind(c.temp_danger_threshold)
        .bind(c.humidity_warning_threshold)
        .bind(c.humidity_danger_threshold)
        .bind(c.enable_gas_alerts)
        .bind(c.enable_temp_alerts)
        .bind(c.enable_flame_alerts)
        .bind(c.alert_cooldown_seconds)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to upsert device_settings for {}", c.device_id))?;
        Ok(())
    }
}

#[async_trait]
impl AlertSink for PgStore {
    async fn insert(&self, alert: &Alert) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO alerts
                (device_id, message, severity, gas, temp, humidity, flame, time, location, email)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(&alert.device_id)
        .bind(&alert.message)
        .bind(alert.severity)
        .bind(alert.gas)
        .bind(alert.temp)
        .bind(alert.humidity)
        .bind(alert.flame)
        .bind(alert.time)
        .bind(&alert.location)
        .bind(&alert.email)
        .execute(&self.pool)
        .await
        .context("failed to insert alert")?;
        Ok(())
    }
}

#[async_trait]
impl AlertRepository for PgStore {
    async fn list(&self, device_id: Option<&str>, limit: i64) -> Result<Vec<AlertRecord>> {
        let sql = format!(
            "SELECT {ALERT_COLUMNS} FROM alerts \
             WHERE ($1::text IS NULL OR device_id = $1) \
             ORDER BY time DESC LIMIT $2"
        );
        sqlx::query_as::<_, AlertRecord>(&sql)
            .bind(device_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .context("failed to list alerts")
    }

    async fn acknowledge(
        &self,
        id: Uuid,
        acknowledged_by: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<Option<AlertRecord>> {
        let sql = format!(
            "UPDATE alerts SET acknowledged = TRUE, acknowledged_at = $2, acknowledged_by = $3 \
             WHERE id = $1 RETURNING {ALERT_COLUMNS}"
        );
        sqlx::query_as::<_, AlertRecord>(&sql)
            .bind(id)
            .bind(at)
            .bind(acknowledged_by)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("failed to acknowledge alert {id}"))
    }

    async fn acknowledge_all(&self, acknowledged_by: Option<&str>, at: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE alerts SET acknowledged = TRUE, acknowledged_at = $1, acknowledged_by = $2 \
             WHERE NOT acknowledged",
        )
        .bind(at)
        .bind(acknowledged_by)
        .execute(&self.pool)
        .await
        .context("failed to acknowledge alerts")?;
        Ok(result.rows_affected())
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM alerts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to delete alert {id}"))?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl RecipientResolver for PgStore {
    /// Prefers a subscriber bound to this device over a global one.
    async fn resolve_email(&self, device_id: &str) -> Result<Option<String>> {
        let email = sqlx::query_scalar::<_, String>(
            r#"
            SELECT email
            FROM alert_subscribers
            WHERE active AND (device_id = $1 OR device_id IS NULL)
            ORDER BY device_id IS NULL, created_at
            LIMIT 1
            "#,
        )
        .bind(device_id)
        .fetch_optional(&self.pool)
        .await
        .context("failed to look up alert subscriber")?;
        Ok(email)
    }
}

#[async_trait]
impl ReadingStore for PgStore {
    async fn insert_reading(&self, r: &SensorReading) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sensor_data (device_id, time, gas, temp, humidity, flame)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&r.device_id)
        .bind(r.time)
        .bind(r.gas)
        .bind(r.temp)
        .bind(r.humidity)
        .bind(r.flame)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to insert sensor_data for {}", r.device_id))?;
        Ok(())
    }

    async fn touch_device(&self, device_id: &str, seen_at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO devices (device_id, status, last_seen)
            VALUES ($1, 'online', $2)
            ON CONFLICT (device_id) DO UPDATE SET
                status     = 'online',
                last_seen  = GREATEST(devices.last_seen, EXCLUDED.last_seen),
                updated_at = now()
            "#,
        )
        .bind(device_id)
        .bind(seen_at)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to update last_seen for {device_id}"))?;
        Ok(())
    }

    async fn mark_stale_offline(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE devices
            SET status = 'offline', updated_at = now()
            WHERE status = 'online'
              AND (last_seen IS NULL OR last_seen < $1)
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .context("failed to mark stale devices offline")?;
        Ok(result.rows_affected())
    }
}
