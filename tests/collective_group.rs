use anyhow::Result;
use surfread::testing::{
    StubGrid, SurfFileBuilder, run_group, sample_square_2d, sample_tetra_3d, write_temp_text,
};
use surfread::*;

fn read_on_rank(
    comm: &ThreadComm,
    domain: &Domain,
    args: &[&str],
    config: ReadSurfConfig,
) -> Result<(GeometryStore, IngestSummary)> {
    let mut store = GeometryStore::new();
    let summary = ReadSurf::new(comm, domain)
        .with_config(config)
        .command(&StubGrid::defined(), &mut store, args, |_, _| {})?;
    Ok((store, summary))
}

#[test]
fn every_rank_builds_the_same_store() -> Result<()> {
    let file = sample_tetra_3d().write_temp()?;
    let path = file.path().to_string_lossy().to_string();
    let domain = Domain::new(Dimension::Three, [0.0; 3], [10.0; 3]);
    let args = [
        "tet",
        path.as_str(),
        "ftrans",
        "0.5",
        "0.5",
        "0.5",
        "rotate",
        "0.4",
        "1",
        "0",
        "0",
        "invert",
    ];

    let results = run_group(4, |comm| {
        read_on_rank(&comm, &domain, &args, ReadSurfConfig::default())
            .and_then(|(store, _)| Ok(serde_json::to_string(&store)?))
    });

    let mut solo = GeometryStore::new();
    ReadSurf::new(&Solo, &domain).command(&StubGrid::defined(), &mut solo, &args, |_, _| {})?;
    let expected = serde_json::to_string(&solo)?;

    for r in results {
        assert_eq!(r?, expected);
    }
    Ok(())
}

#[test]
fn tiny_chunks_across_ranks() -> Result<()> {
    let mut b = SurfFileBuilder::new(Dimension::Two);
    for i in 0..20 {
        b = b.point(i as f64, 1.0, 0.0);
    }
    for i in 1..20 {
        b = b.line(i, i + 1);
    }
    let file = b.write_temp()?;
    let path = file.path().to_string_lossy().to_string();
    let domain = Domain::new(Dimension::Two, [0.0, 0.0, -0.5], [20.0, 20.0, 0.5]);
    let config = ReadSurfConfig {
        chunk_size: 3,
        ..Default::default()
    };

    let args = ["chain", path.as_str()];
    let results = run_group(3, |comm| read_on_rank(&comm, &domain, &args, config.clone()));
    for r in results {
        let (store, summary) = r?;
        assert_eq!(summary.nline, 19);
        assert_eq!(store.points()[19].x, [19.0, 1.0, 0.0]);
        assert_eq!(store.lines()[18], Line { id: 0, p1: 19, p2: 20 });
    }
    Ok(())
}

#[test]
fn group_fatal_errors_reach_every_rank() -> Result<()> {
    let text = "t\n2 points\n1 lines\n\nPoints\n\n1 0 0\n2 1 0\n\nLines\n\n1 1 7\n";
    let file = write_temp_text(text)?;
    let path = file.path().to_string_lossy().to_string();
    let domain = Domain::new(Dimension::Two, [0.0, 0.0, -0.5], [10.0, 10.0, 0.5]);

    let errors = run_group(3, |comm| {
        read_on_rank(&comm, &domain, &["bad", path.as_str()], ReadSurfConfig::default())
            .err()
            .and_then(|e| surf_error(&e).cloned())
    });
    for e in errors {
        let e = e.expect("every rank should fail");
        assert!(matches!(e, SurfError::InvalidIndex { kind: "line", .. }));
        assert_eq!(e.scope(), FatalScope::Group);
    }
    Ok(())
}

#[test]
fn leader_open_failure_tears_down_followers() {
    let domain = Domain::new(Dimension::Two, [0.0, 0.0, -0.5], [10.0, 10.0, 0.5]);
    let errors = run_group(3, |comm| {
        read_on_rank(&comm, &domain, &["gone", "/no/such/dir/gone.surf"], ReadSurfConfig::default())
            .err()
            .and_then(|e| surf_error(&e).cloned())
    });
    let mut it = errors.into_iter();
    let leader = it.next().flatten().expect("leader should fail");
    assert!(matches!(leader, SurfError::CannotOpen { .. }));
    assert_eq!(leader.scope(), FatalScope::Leader);
    for follower in it {
        assert!(matches!(follower, Some(SurfError::Collective { .. })));
    }
}

#[test]
fn followers_never_touch_the_file() -> Result<()> {
    let file = sample_square_2d().write_temp()?;
    let path = file.path().to_string_lossy().to_string();
    let domain = Domain::new(Dimension::Two, [0.0, 0.0, -0.5], [10.0, 10.0, 0.5]);

    // only the leader gets the real path
    let results = run_group(2, |comm| {
        let p = if comm.is_leader() { path.as_str() } else { "/nowhere.surf" };
        read_on_rank(&comm, &domain, &["sq", p], ReadSurfConfig::default()).map(|(s, _)| s.nline())
    });
    for r in results {
        assert_eq!(r?, 4);
    }
    Ok(())
}
