//! Full run: real git repository, report files on disk, mock Bitbucket.

use std::path::Path;
use std::process::{Command, Stdio};

use code_insights::changeset::git_available;
use code_insights::config::Secret;
use code_insights::retry::RetryPolicy;
use code_insights::{
    BitbucketClient, BitbucketTarget, Config, Git, LocalWorkspace, Pipeline, RunState, Tool,
};
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn git(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(["-c", "user.name=ci", "-c", "user.email=ci@example.com"])
        .args(args)
        .env_remove("GIT_DIR")
        .env_remove("GIT_WORK_TREE")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .unwrap();
    assert!(status.success(), "git {args:?} failed");
}

fn write(root: &Path, rel: &str, content: &str) {
    let file = root.join(rel);
    std::fs::create_dir_all(file.parent().unwrap()).unwrap();
    std::fs::write(file, content).unwrap();
}

/// master has Foo and Bar; the feature branch touches only Foo.
fn feature_repo() -> tempfile::TempDir {
    let repo = tempfile::tempdir().unwrap();
    let root = repo.path();
    git(root, &["init", "-q", "-b", "master"]);
    write(root, "src/main/java/com/acme/Foo.java", "class Foo {}\n");
    write(root, "src/main/java/com/acme/Bar.java", "class Bar {}\n");
    git(root, &["add", "-A"]);
    git(root, &["commit", "-q", "-m", "base"]);

    git(root, &["checkout", "-q", "-b", "feature"]);
    write(root, "src/main/java/com/acme/Foo.java", "class Foo { int unused; }\n");
    git(root, &["commit", "-q", "-am", "feature"]);
    repo
}

fn checkstyle_report(root: &Path) -> String {
    let root = root.display();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<checkstyle version="10.12.0">
  <file name="{root}/src/main/java/com/acme/Foo.java">
    <error line="1" column="1" severity="warning" message="Missing a Javadoc comment." source="com.puppycrawl.tools.checkstyle.checks.javadoc.MissingJavadocTypeCheck"/>
  </file>
  <file name="{root}/src/main/java/com/acme/Bar.java">
    <error line="1" column="1" severity="warning" message="Missing a Javadoc comment." source="com.puppycrawl.tools.checkstyle.checks.javadoc.MissingJavadocTypeCheck"/>
  </file>
</checkstyle>"#
    )
}

const SPOTBUGS: &str = r#"<BugCollection version="4.8.3">
  <BugInstance type="URF_UNREAD_FIELD" priority="2" category="PERFORMANCE">
    <ShortMessage>Unread field</ShortMessage>
    <LongMessage>Unread field: com.acme.Foo.unused</LongMessage>
    <Class classname="com.acme.Foo" primary="true">
      <SourceLine classname="com.acme.Foo" sourcefile="Foo.java" sourcepath="com/acme/Foo.java"/>
    </Class>
    <SourceLine classname="com.acme.Foo" start="1" end="1" sourcefile="Foo.java" sourcepath="com/acme/Foo.java"/>
  </BugInstance>
</BugCollection>"#;

const JACOCO: &str = r#"<report name="demo">
  <package name="com/acme">
    <sourcefile name="Foo.java"><line nr="1" mi="0" ci="2" mb="0" cb="0"/></sourcefile>
    <sourcefile name="Bar.java"><line nr="1" mi="3" ci="0" mb="0" cb="0"/></sourcefile>
  </package>
</report>"#;

#[tokio::test]
async fn publishes_changed_file_results_to_bitbucket() {
    if !git_available() {
        return;
    }
    let repo = feature_repo();
    let root = repo.path();
    write(root, "target/checkstyle-result.xml", &checkstyle_report(root));
    write(root, "target/spotbugsXml.xml", SPOTBUGS);
    write(root, "target/site/jacoco/jacoco.xml", JACOCO);

    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path_regex(r"^/rest/insights/1\.0/projects/ACME/repos/demo/commits/[0-9a-f]+/reports/lint$"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path_regex(r"/reports/lint/annotations$"))
        .respond_with(ResponseTemplate::new(204))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path_regex(r"^/rest/code-coverage/1\.0/commits/[0-9a-f]+$"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let config = Config {
        bitbucket_url: server.uri(),
        project: "ACME".into(),
        repository: "demo".into(),
        commit_id: "HEAD".into(),
        report_key: "lint".into(),
        username: "ci".into(),
        password: Secret::new("secret"),
        workspace: root.to_path_buf(),
        base_branch: "master".into(),
        checkstyle_file_path: "target/checkstyle-result.xml".into(),
        spotbugs_file_path: "target/spotbugsXml.xml".into(),
        jacoco_file_path: "target/site/jacoco/jacoco.xml".into(),
        ..Config::default()
    };
    config.validate().unwrap();

    let files = LocalWorkspace::new(root).isolated(true);
    let publisher = BitbucketClient::new(
        BitbucketTarget::from_config(&config),
        config.publish.timeout(),
        RetryPolicy::none(),
    )
    .unwrap();

    let outcome = Pipeline::new(&config, &files, &Git, &publisher)
        .run()
        .await
        .unwrap();

    assert_eq!(outcome.state, RunState::Done, "{outcome}");
    assert_eq!(outcome.changed_files, 1);
    assert!(outcome.report_registered);

    let checkstyle = outcome.stats(Tool::Checkstyle).unwrap();
    assert_eq!((checkstyle.found, checkstyle.kept, checkstyle.published), (2, 1, 1));
    let spotbugs = outcome.stats(Tool::SpotBugs).unwrap();
    assert_eq!(spotbugs.published, 1);
    let coverage = outcome.stats(Tool::Jacoco).unwrap();
    assert_eq!((coverage.found, coverage.kept, coverage.published), (2, 1, 1));

    let requests = server.received_requests().await.unwrap();
    let annotation_paths: Vec<String> = requests
        .iter()
        .filter(|r| r.url.path().ends_with("/annotations"))
        .flat_map(|r| {
            let body: serde_json::Value = r.body_json().unwrap();
            body["annotations"]
                .as_array()
                .unwrap()
                .iter()
                .map(|a| a["path"].as_str().unwrap().to_string())
                .collect::<Vec<_>>()
        })
        .collect();
    assert_eq!(
        annotation_paths,
        vec![
            "src/main/java/com/acme/Foo.java",
            "src/main/java/com/acme/Foo.java"
        ]
    );
}
