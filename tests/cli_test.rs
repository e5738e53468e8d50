use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::io::Write;
use std::process::Command;

const HEADER: &str =
    "order,number,resource,gateway,gross,discount,net,status,payment_status,reference,remark";

fn replay() -> Command {
    let mut cmd = Command::new(cargo_bin!("checkout-engine"));
    cmd.env_remove("CHECKOUT_DB_PATH")
        .env_remove("CHECKOUT_CATALOG")
        .env("RUST_LOG", "off")
        .arg("replay");
    cmd
}

#[test]
fn test_replay_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = replay();
    cmd.arg("tests/fixtures/events.csv")
        .arg("--catalog")
        .arg("tests/fixtures/catalog.json");

    cmd.assert()
        .success()
        .stdout(predicate::str::starts_with(HEADER))
        // Failed payment released both seats
        .stdout(predicate::str::contains(
            ",seats:bus-42x2,redirect,500,0,500,created,failed,,payment failed: provider status failed",
        ))
        // ...so the retried single-seat order went through, once
        .stdout(predicate::str::contains(
            ",seats:bus-42x1,redirect,250,0,250,confirmed,paid,T1,",
        ))
        // Capped percentage coupon, then a late failure annotation
        .stdout(predicate::str::contains(
            ",plan:gold,capture,1000,80,920,confirmed,paid,T2,late failure reported by provider: failed (T3)",
        ))
        // Coupon larger than the price settles without a provider
        .stdout(predicate::str::contains(
            ",plan:basic,receipt,500,500,0,confirmed,paid,COMPLIMENTARY-ORD",
        ))
        .stdout(predicate::str::contains(
            ",plan:gold,redirect,1000,0,1000,created,failed,,cancelled: abandoned",
        ))
        .stdout(predicate::str::contains(
            ",created,failed,,\"amount mismatch: expected 100000, provider reported 1\"",
        ))
        .stdout(predicate::str::contains("\ne,").not())
        .stderr(predicate::str::contains(
            "Error processing event: Insufficient inventory for resource bus-42: requested 1, available 0",
        ))
        .stderr(predicate::str::contains("Error processing event: Invalid coupon: NOPE"));

    Ok(())
}

#[test]
fn test_replay_reports_bad_rows_and_continues() {
    let mut csv = tempfile::NamedTempFile::new().unwrap();
    writeln!(csv, "op,order,resource,quantity,gateway,coupon,status,amount_minor,reference").unwrap();
    writeln!(csv, "refund,x,plan:gold,,redirect,,,,").unwrap();
    writeln!(csv, "place,y,plan:gold,,redirect,,,,").unwrap();
    writeln!(csv, "place,z,bus:1,,redirect,,,,").unwrap();
    writeln!(csv, "confirm,ghost,,,,,paid,,").unwrap();

    let mut cmd = replay();
    cmd.arg(csv.path())
        .arg("--catalog")
        .arg("tests/fixtures/catalog.json");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(",plan:gold,redirect,1000,0,1000,created,pending,,"))
        .stderr(predicate::str::contains("Error reading event"))
        .stderr(predicate::str::contains("Error processing event: Validation error: Unrecognised resource bus:1"))
        .stderr(predicate::str::contains("Error processing event: Order not found: ghost"));
}

#[test]
fn test_replay_without_catalog_knows_nothing() {
    let mut csv = tempfile::NamedTempFile::new().unwrap();
    writeln!(csv, "op,order,resource,quantity,gateway,coupon,status,amount_minor,reference").unwrap();
    writeln!(csv, "place,a,plan:gold,,redirect,,,,").unwrap();

    let mut cmd = replay();
    cmd.arg(csv.path());

    cmd.assert()
        .success()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Unknown resource: gold"));
}

#[test]
fn test_missing_input_file_fails() {
    let mut cmd = replay();
    cmd.arg("tests/fixtures/does-not-exist.csv");
    cmd.assert().failure();
}
