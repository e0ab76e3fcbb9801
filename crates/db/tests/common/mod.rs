//! Seed helpers shared by the database integration tests.

#![allow(dead_code)]

use chrono::NaiveDate;
use litis_core::types::DbId;
use litis_db::models::bulletin::NormalizedBulletinEntry;
use litis_db::models::monitored_case::{CreateMonitoredCase, MonitoredCase};
use litis_db::models::user::{CreateUser, User};
use litis_db::repositories::{BulletinEntryRepo, MonitoredCaseRepo, UserRepo};
use sqlx::PgPool;

pub async fn seed_user(pool: &PgPool, email: &str) -> User {
    UserRepo::create(
        pool,
        &CreateUser {
            email: email.to_string(),
            full_name: Some("Ana Pérez".to_string()),
            whatsapp_phone: Some("+5215512345678".to_string()),
            whatsapp_enabled: None,
            email_enabled: None,
        },
    )
    .await
    .unwrap()
}

pub async fn seed_case(pool: &PgPool, user_id: DbId, case_number: &str, key: &str) -> MonitoredCase {
    MonitoredCaseRepo::create(
        pool,
        user_id,
        &CreateMonitoredCase {
            case_number: Some(case_number.to_string()),
            court_name: Some("Juzgado Primero Civil".to_string()),
            party_name: None,
        },
        Some(key),
    )
    .await
    .unwrap()
}

pub fn entry(date: NaiveDate, case_number: &str, key: Option<&str>, text: &str) -> NormalizedBulletinEntry {
    NormalizedBulletinEntry {
        bulletin_date: date,
        court_name: "Juzgado Primero Civil".to_string(),
        court_name_normalized: "JUZGADO PRIMERO CIVIL".to_string(),
        case_number: case_number.to_string(),
        case_number_normalized: case_number.to_uppercase(),
        case_key: key.map(str::to_string),
        raw_text: text.to_string(),
        raw_text_normalized: text.to_uppercase(),
        source_url: Some("https://boletin.example.mx/2025-03-10".to_string()),
        source: "tsj-cdmx".to_string(),
        content_hash: format!("{date}|{case_number}|{text}"),
    }
}

pub fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
}

/// Insert one entry and return its id.
pub async fn seed_entry(pool: &PgPool, date: NaiveDate, case_number: &str, key: &str) -> DbId {
    let ids = BulletinEntryRepo::insert_batch(pool, &[entry(date, case_number, Some(key), "")])
        .await
        .unwrap();
    ids[0]
}
