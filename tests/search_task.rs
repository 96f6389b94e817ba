mod common;

use std::thread;

use common::{terms, Fixture};
use divan_search::{
    SearchParameters, SearchResults, SearchScope, Task, TaskContext, TaskError, TaskEvent,
    TaskManager, TaskOutcome,
};

const ROWID_QUERY: &str = "SELECT poem_id, text, vorder FROM verse ORDER BY rowid";

fn run_inline(
    params: SearchParameters,
    context: &TaskContext,
) -> (Result<SearchResults, TaskError>, Vec<String>) {
    let (task, handle) = Task::new(params);
    task.run(context);

    let mut statuses = Vec::new();
    let outcome = handle.wait_with_status(|text| statuses.push(text.to_string()));
    let results = outcome.map(|outcome| match outcome {
        TaskOutcome::Search(results) => results,
        other => panic!("unexpected outcome {other:?}"),
    });
    (results, statuses)
}

fn texts(results: &SearchResults, poem_id: i64) -> Vec<&str> {
    results
        .get(poem_id)
        .iter()
        .map(|found| found.verse_text.as_str())
        .collect()
}

fn scattered_rows() -> Fixture {
    let fixture = Fixture::new();
    fixture.rows(&[(5, 1, "boye gol"), (5, 2, "bi gol"), (7, 1, "sabz")]);
    fixture
}

#[test]
fn matches_are_grouped_by_poem_in_row_order() {
    let fixture = scattered_rows();
    let params = SearchParameters::new(fixture.path(), SearchScope::All, terms(&["gol"]))
        .with_query(ROWID_QUERY);

    let (results, _) = run_inline(params, &TaskContext::quiet());
    let results = results.unwrap();

    assert_eq!(results.poem_ids().collect::<Vec<_>>(), [5]);
    assert_eq!(texts(&results, 5), ["boye gol", "bi gol"]);
    assert!(!results.contains_poem(7));
}

#[test]
fn excluded_terms_drop_verses() {
    let fixture = scattered_rows();
    let params = SearchParameters::new(fixture.path(), SearchScope::All, terms(&["gol"]))
        .with_excluded(terms(&["bi"]))
        .with_query(ROWID_QUERY);

    let (results, _) = run_inline(params, &TaskContext::quiet());
    assert_eq!(texts(&results.unwrap(), 5), ["boye gol"]);
}

#[test]
fn accepted_verses_contain_every_term_and_no_exclusion() {
    // small deterministic generator over a four letter alphabet
    let mut seed = 0x2545_f491_u32;
    let mut next = move || {
        seed ^= seed << 13;
        seed ^= seed >> 17;
        seed ^= seed << 5;
        seed
    };

    let mut verses = Vec::new();
    for _ in 0..300 {
        let words: Vec<String> = (0..(next() % 4 + 1))
            .map(|_| {
                (0..(next() % 3 + 1))
                    .map(|_| ['a', 'b', 'c', 'z'][(next() % 4) as usize])
                    .collect()
            })
            .collect();
        verses.push(words.join(" "));
    }

    let fixture = Fixture::new();
    let rows: Vec<(i64, i64, &str)> = verses
        .iter()
        .enumerate()
        .map(|(i, text)| ((i / 10) as i64 + 1, (i % 10) as i64 + 1, text.as_str()))
        .collect();
    fixture.rows(&rows);

    let params = SearchParameters::new(fixture.path(), SearchScope::All, terms(&["ab", "c"]))
        .with_excluded(terms(&["z"]));
    let (results, _) = run_inline(params, &TaskContext::quiet());
    let results = results.unwrap();

    let expected: Vec<&str> = verses
        .iter()
        .map(String::as_str)
        .filter(|v| v.contains("ab") && v.contains('c') && !v.contains('z'))
        .collect();
    let found: Vec<&str> = results
        .iter()
        .map(|(_, found)| found.verse_text.as_str())
        .collect();
    assert_eq!(found, expected);
}

#[test]
fn progress_is_reported_per_batch_and_at_the_end() {
    let fixture = Fixture::new();
    fixture.poem(1, 0, "t", &["gol 1", "gol 2", "gol 3", "gol 4", "gol 5", "sabz"]);

    let context = TaskContext {
        progress_batch: Some(2),
        ..TaskContext::default()
    };
    let params = SearchParameters::new(fixture.path(), SearchScope::All, terms(&["gol"]));
    let (results, statuses) = run_inline(params, &context);

    assert_eq!(results.unwrap().len(), 5);
    assert_eq!(
        statuses,
        [
            "Search Result(s): 1",
            "Search Result(s): 3",
            "Search Result(s): 5",
            "Last-Search Result(s): 5",
        ]
    );
}

#[test]
fn quiet_context_reports_nothing() {
    let fixture = scattered_rows();
    let params = SearchParameters::new(fixture.path(), SearchScope::All, terms(&["gol"]));
    let (results, statuses) = run_inline(params, &TaskContext::quiet());
    assert_eq!(results.unwrap().len(), 2);
    assert!(statuses.is_empty());
}

#[test]
fn matches_carry_poem_title_and_poet_name() {
    let fixture = Fixture::new();
    fixture
        .poet(2, "Hafez")
        .poem(10, 2, "Ghazal 1", &["boye gol", "sabz"]);

    let params = SearchParameters::new(fixture.path(), SearchScope::All, terms(&["gol"]));
    let (results, _) = run_inline(params, &TaskContext::quiet());
    let results = results.unwrap();

    let found = &results.get(10)[0];
    assert_eq!(found.poem_title, "Ghazal 1");
    assert_eq!(found.poet_name, "Hafez");
    assert_eq!(found.to_string(), "boye gol | Ghazal 1 | Hafez");
}

#[test]
fn poet_scope_skips_other_poets() {
    let fixture = Fixture::new();
    fixture
        .poet(1, "Hafez")
        .poet(2, "Saadi")
        .poem(10, 1, "a", &["gol e hafez"])
        .poem(20, 2, "b", &["gol e saadi"]);

    let params = SearchParameters::new(fixture.path(), SearchScope::Poet(2), terms(&["gol"]));
    let (results, _) = run_inline(params, &TaskContext::quiet());
    let results = results.unwrap();

    assert_eq!(results.poem_ids().collect::<Vec<_>>(), [20]);
}

#[test]
fn title_scope_matches_poem_titles() {
    let fixture = Fixture::new();
    fixture
        .poem(1, 0, "ghazal e gol", &["sabz"])
        .poem(2, 0, "robai", &["gol"]);

    let params = SearchParameters::new(
        fixture.path(),
        SearchScope::from_poet_id(divan_search::TITLE_SENTINEL),
        terms(&["gol"]),
    );
    let (results, _) = run_inline(params, &TaskContext::quiet());
    let results = results.unwrap();

    assert_eq!(results.poem_ids().collect::<Vec<_>>(), [1]);
    assert_eq!(texts(&results, 1), ["ghazal e gol"]);
}

#[test]
fn wildcard_terms_match_case_insensitively() {
    let fixture = Fixture::new();
    fixture.poem(
        1,
        0,
        "t",
        &["GOLHA ye sorkh", "sabz", "gol o sabza o bolbol", "bolbol o gol"],
    );

    let params = SearchParameters::new(fixture.path(), SearchScope::All, terms(&["go%"]));
    let (results, _) = run_inline(params, &TaskContext::quiet());
    assert_eq!(
        texts(&results.unwrap(), 1),
        ["GOLHA ye sorkh", "gol o sabza o bolbol", "bolbol o gol"]
    );

    let params = SearchParameters::new(fixture.path(), SearchScope::All, terms(&["gol%%bolbol"]));
    let (results, _) = run_inline(params, &TaskContext::quiet());
    assert_eq!(texts(&results.unwrap(), 1), ["gol o sabza o bolbol"]);
}

fn ghazal(fixture: &Fixture) {
    fixture.poem(
        1,
        0,
        "ghazal",
        &[
            "agar an tork shirazi be dast arad del ma ra",
            "be khal hindooyash bakhsham samarqand o bokhara ra",
            "bede saqi mey baqi ke dar jannat nakhahi yaft",
            "kenar ab roknabad o golgasht mosalla ra",
        ],
    );
}

#[test]
fn radif_terms_match_lines_ending_with_the_radif() {
    let fixture = Fixture::new();
    ghazal(&fixture);

    let params = SearchParameters::new(fixture.path(), SearchScope::All, terms(&["ra="]));
    let (results, _) = run_inline(params, &TaskContext::quiet());
    let results = results.unwrap();
    assert_eq!(results.len(), 3);
    assert!(texts(&results, 1).iter().all(|t| t.ends_with(" ra")));
}

#[test]
fn rhyme_terms_combine_with_plain_terms() {
    let fixture = Fixture::new();
    ghazal(&fixture);

    let params = SearchParameters::new(fixture.path(), SearchScope::All, terms(&["a==", "ab"]));
    let (results, _) = run_inline(params, &TaskContext::quiet());
    assert_eq!(
        texts(&results.unwrap(), 1),
        ["kenar ab roknabad o golgasht mosalla ra"]
    );
}

#[test]
fn radif_is_judged_against_each_poems_own_verses() {
    let fixture = Fixture::new();
    // rows of two poems alternate, so every row switches poem
    fixture.rows(&[
        (1, 1, "agar an tork del ma ra"),
        (2, 1, "boye gol ast"),
        (1, 2, "samarqand o bokhara ra"),
        (2, 2, "sabz e bol ast"),
        (1, 3, "golgasht mosalla ra"),
        (2, 3, "sabz o ra"),
    ]);

    let params = SearchParameters::new(fixture.path(), SearchScope::All, terms(&["ra="]))
        .with_query(ROWID_QUERY);
    let (results, _) = run_inline(params, &TaskContext::quiet());
    let results = results.unwrap();
    assert_eq!(results.poem_ids().collect::<Vec<_>>(), [1]);
    assert_eq!(results.len(), 3);

    let params = SearchParameters::new(fixture.path(), SearchScope::All, terms(&["ast="]))
        .with_query(ROWID_QUERY);
    let (results, _) = run_inline(params, &TaskContext::quiet());
    assert_eq!(texts(&results.unwrap(), 2), ["boye gol ast", "sabz e bol ast"]);
}

#[test]
fn whitespace_runs_in_stored_text_still_match() {
    let fixture = Fixture::new();
    fixture.poem(
        1,
        0,
        "t",
        &["boye gol  sorkh", "gol\tsorkh ast", "gol\u{00A0}sorkh", "sorkh gol"],
    );

    let params = SearchParameters::new(fixture.path(), SearchScope::All, terms(&["gol sorkh"]));
    let (results, _) = run_inline(params, &TaskContext::quiet());
    assert_eq!(
        texts(&results.unwrap(), 1),
        ["boye gol  sorkh", "gol\tsorkh ast", "gol\u{00A0}sorkh"]
    );
}

#[test]
fn missing_database_completes_empty() {
    let dir = tempfile::tempdir().unwrap();
    let params = SearchParameters::new(
        dir.path().join("absent.s3db"),
        SearchScope::All,
        terms(&["gol"]),
    );
    let (results, statuses) = run_inline(params, &TaskContext::default());
    assert!(results.unwrap().is_empty());
    assert!(statuses.is_empty());
}

#[test]
fn cancel_before_run_reports_cancellation_only() {
    let fixture = scattered_rows();
    let params = SearchParameters::new(fixture.path(), SearchScope::All, terms(&["gol"]));
    let (task, handle) = Task::new(params);
    handle.cancel();
    task.run(&TaskContext::default());

    let events: Vec<TaskEvent> = handle.events().try_iter().collect();
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], TaskEvent::Canceled { .. }));
}

#[test]
fn cancel_mid_stream_stops_progress() {
    let fixture = Fixture::new();
    fixture.long_poem(1, "gol", 50_000);

    let context = TaskContext {
        progress_batch: Some(1),
        ..TaskContext::default()
    };
    let params = SearchParameters::new(fixture.path(), SearchScope::All, terms(&["gol"]));
    let (task, handle) = Task::new(params);
    let worker = thread::spawn(move || task.run(&context));

    let first = handle.events().recv().unwrap();
    assert!(matches!(first, TaskEvent::StatusChanged { .. }));
    handle.cancel();
    worker.join().unwrap();

    let rest: Vec<TaskEvent> = handle.events().try_iter().collect();
    let (terminal, statuses) = rest.split_last().unwrap();
    assert!(matches!(terminal, TaskEvent::Canceled { .. }));
    assert!(statuses.len() < 50_000);
    assert!(statuses.iter().all(|event| match event {
        TaskEvent::StatusChanged { text, .. } => !text.starts_with("Last-Search"),
        _ => false,
    }));
}

#[test]
fn concurrent_searches_keep_their_own_results() {
    let left = Fixture::new();
    left.long_poem(1, "gol left", 300);
    let right = Fixture::new();
    right.long_poem(1, "gol right", 200);

    let manager = TaskManager::with_context(2, TaskContext::quiet());
    let a = manager
        .start_task(
            SearchParameters::new(left.path(), SearchScope::All, terms(&["gol"])),
            false,
        )
        .unwrap();
    let b = manager
        .start_task(
            SearchParameters::new(right.path(), SearchScope::All, terms(&["gol"])),
            false,
        )
        .unwrap();

    let TaskOutcome::Search(a) = a.wait().unwrap() else {
        panic!("expected search results");
    };
    let TaskOutcome::Search(b) = b.wait().unwrap() else {
        panic!("expected search results");
    };

    assert_eq!(a.len(), 300);
    assert_eq!(b.len(), 200);
    assert!(a.iter().all(|(_, found)| found.verse_text.contains("left")));
    assert!(b.iter().all(|(_, found)| found.verse_text.contains("right")));
}
