use anyhow::Result;
use assert_cmd::Command;
use assert_fs::prelude::*;
use assert_fs::NamedTempFile;
use predicates::prelude::*;

fn cli_command() -> Result<Command> {
    Ok(Command::cargo_bin("sparguard")?)
}

#[test]
fn cli_help() -> Result<()> {
    cli_command()?
        .assert()
        .failure()
        .stdout("")
        .stderr(predicate::str::contains("Usage"));
    Ok(())
}

#[test]
fn cli_rewrite_inline_query() -> Result<()> {
    cli_command()?
        .arg("rewrite")
        .arg("--query")
        .arg("SELECT ?s ?p ?o WHERE { ?s ?p ?o }")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("FILTER")
                .and(predicate::str::contains("STRSTARTS(STR(?p), \"hk://role\")"))
                .and(predicate::str::contains("BOUND(?o)")),
        );
    Ok(())
}

#[test]
fn cli_rewrite_stdin() -> Result<()> {
    cli_command()?
        .arg("rewrite")
        .write_stdin("ASK { ?s <http://example.com/p> ?o }")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("ASK").and(predicate::str::contains("FILTER")));
    Ok(())
}

#[test]
fn cli_rewrite_file_is_idempotent() -> Result<()> {
    let file = NamedTempFile::new("query.rq")?;
    file.write_str("SELECT ?s WHERE { ?s ?p ?o }")?;
    let output = cli_command()?
        .arg("rewrite")
        .arg("--query-file")
        .arg(file.path())
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let once = String::from_utf8(output)?;
    cli_command()?
        .arg("rewrite")
        .arg("--query")
        .arg(&once)
        .assert()
        .success()
        .stdout(predicate::str::diff(once.clone()));
    Ok(())
}

#[test]
fn cli_rewrite_with_base() -> Result<()> {
    cli_command()?
        .arg("rewrite")
        .arg("--base")
        .arg("http://example.com/")
        .arg("--query")
        .arg("SELECT ?o WHERE { <s> <p> ?o }")
        .assert()
        .success()
        .stdout(predicate::str::contains("<http://example.com/s>"));
    Ok(())
}

#[test]
fn cli_rewrite_invalid_base() -> Result<()> {
    cli_command()?
        .arg("rewrite")
        .arg("--base")
        .arg("not an iri")
        .arg("--query")
        .arg("SELECT * WHERE { ?s ?p ?o }")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid base IRI"));
    Ok(())
}

#[test]
fn cli_rewrite_invalid_query_is_returned_unchanged() -> Result<()> {
    let query = "SELECT ?s WHERE { ?s ?p";
    cli_command()?
        .arg("rewrite")
        .arg("--query")
        .arg(query)
        .assert()
        .success()
        .stdout(query)
        .stderr(predicate::str::contains("WARN"));
    Ok(())
}

#[test]
fn cli_rewrite_invalid_query_strict() -> Result<()> {
    cli_command()?
        .arg("rewrite")
        .arg("--strict")
        .arg("--query")
        .arg("SELECT ?s WHERE { ?s ?p")
        .assert()
        .failure()
        .stdout("")
        .stderr(predicate::str::contains("could not be rewritten"));
    Ok(())
}

#[test]
fn cli_rewrite_too_deep_strict() -> Result<()> {
    cli_command()?
        .arg("rewrite")
        .arg("--strict")
        .arg("--max-depth")
        .arg("0")
        .arg("--query")
        .arg("SELECT * WHERE { { SELECT ?s WHERE { ?s ?p ?o } } }")
        .assert()
        .failure()
        .stderr(predicate::str::contains("limit of 0"));
    Ok(())
}

#[test]
fn cli_compact_stdin() -> Result<()> {
    cli_command()?
        .arg("compact")
        .write_stdin(r#"[[{"parent": "B"}], [{"parent": "A"}], [{"parent": "C"}]]"#)
        .assert()
        .success()
        .stdout("[[{\"parent\":[\"A\",\"B\",\"C\"]}]]\n");
    Ok(())
}

#[test]
fn cli_compact_file_generalize() -> Result<()> {
    let file = NamedTempFile::new("constraints.json")?;
    file.write_str(
        r#"[
            [{"connector": "C1", "binds": {"role": "X"}}],
            [{"connector": "C1", "binds": {"role": "Y"}}],
            [{"connector": "C2", "binds": {"role": "Z"}}]
        ]"#,
    )?;
    cli_command()?
        .arg("compact")
        .arg("--strategy")
        .arg("generalize")
        .arg("--file")
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains(
            r#"{"binds":{"role":["X","Y"]},"connector":"C1"}"#,
        ));
    Ok(())
}

#[test]
fn cli_compact_invalid_json() -> Result<()> {
    cli_command()?
        .arg("compact")
        .write_stdin("{")
        .assert()
        .failure()
        .stderr(predicate::str::contains("JSON array of clause-groups"));
    Ok(())
}

#[test]
fn cli_compact_unknown_strategy() -> Result<()> {
    cli_command()?
        .arg("compact")
        .arg("--strategy")
        .arg("fastest")
        .write_stdin("[]")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown optimization strategy"));
    Ok(())
}

#[test]
fn cli_json_logs() -> Result<()> {
    cli_command()?
        .arg("--log-format")
        .arg("json")
        .arg("compact")
        .env("RUST_LOG", "info")
        .write_stdin("[]")
        .assert()
        .success()
        .stdout("[]\n")
        .stderr(predicate::str::contains("\"level\":\"INFO\""));
    Ok(())
}
