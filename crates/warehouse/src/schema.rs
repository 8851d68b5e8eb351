//! Warehouse DDL.
//!
//! `TABLES_SQL` is destructive: it drops both tables before recreating them.
//! Views are created one at a time and only when absent, so changing a view
//! definition here does not touch a database that already has that view.

/// Tables rebuilt by every recreate run.
pub const TABLES: &[&str] = &["customer_enriched", "enrichment_audit"];

/// Indexes on `customer_enriched`, rebuilt together with the table.
pub const INDEXES: &[&str] = &[
    "IX_customer_enriched_region",
    "IX_customer_enriched_risk",
    "IX_customer_enriched_business",
    "IX_customer_enriched_status",
];

pub const TABLES_SQL: &str = r#"
DROP TABLE IF EXISTS customer_enriched;
DROP TABLE IF EXISTS enrichment_audit;

CREATE TABLE customer_enriched (
    customer_id INTEGER PRIMARY KEY,
    first_name VARCHAR(50) NOT NULL,
    last_name VARCHAR(50) NOT NULL,
    email VARCHAR(100) NOT NULL,
    phone VARCHAR(20),
    postcode VARCHAR(10),
    region VARCHAR(50),
    country VARCHAR(50),
    district VARCHAR(50),
    longitude DECIMAL(10,7),
    latitude DECIMAL(10,7),
    geo_enriched BOOLEAN DEFAULT 0,
    company VARCHAR(100),
    company_size VARCHAR(50),
    industry VARCHAR(50),
    annual_revenue VARCHAR(50),
    is_business BOOLEAN DEFAULT 0,
    calculated_risk VARCHAR(20),
    risk_score_numeric INTEGER,
    risk_factors VARCHAR(500),
    status VARCHAR(20),
    processed_date DATETIME DEFAULT CURRENT_TIMESTAMP,
    data_source VARCHAR(50),
    enrichment_status VARCHAR(50),
    created_date DATETIME DEFAULT CURRENT_TIMESTAMP,
    modified_date DATETIME DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE enrichment_audit (
    audit_id INTEGER PRIMARY KEY AUTOINCREMENT,
    batch_id TEXT DEFAULT (lower(hex(randomblob(16)))),
    operation_type VARCHAR(20),
    records_processed INTEGER,
    records_successful INTEGER,
    records_failed INTEGER,
    processing_start DATETIME,
    processing_end DATETIME,
    duration_seconds INTEGER GENERATED ALWAYS AS (
        CAST(ROUND((julianday(processing_end) - julianday(processing_start)) * 86400) AS INTEGER)
    ) VIRTUAL,
    error_message VARCHAR(1000),
    pipeline_version VARCHAR(20)
);

CREATE INDEX IX_customer_enriched_region ON customer_enriched(region);
CREATE INDEX IX_customer_enriched_risk ON customer_enriched(calculated_risk);
CREATE INDEX IX_customer_enriched_business ON customer_enriched(is_business);
CREATE INDEX IX_customer_enriched_status ON customer_enriched(status);
"#;

/// A view created only if no view with the same name exists.
#[derive(Debug, Clone, Copy)]
pub struct ViewDefinition {
    pub name: &'static str,
    pub sql: &'static str,
}

pub const VIEWS: &[ViewDefinition] = &[
    ViewDefinition {
        name: "risk",
        sql: r#"
CREATE VIEW risk AS
SELECT DISTINCT
    risk_score_numeric,
    calculated_risk,
    risk_factors
FROM customer_enriched
"#,
    },
    ViewDefinition {
        name: "address_info",
        sql: r#"
CREATE VIEW address_info AS
SELECT DISTINCT
    postcode,
    region,
    country,
    district,
    longitude,
    latitude,
    geo_enriched
FROM customer_enriched
"#,
    },
    ViewDefinition {
        name: "customer_normalised",
        sql: r#"
CREATE VIEW customer_normalised AS
SELECT
    customer_id,
    first_name,
    last_name,
    email,
    phone,
    postcode,
    company,
    company_size,
    industry,
    annual_revenue,
    is_business,
    risk_score_numeric,
    status,
    processed_date,
    data_source,
    enrichment_status,
    created_date,
    modified_date
FROM customer_enriched
"#,
    },
];
