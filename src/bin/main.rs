use cordyceps_avl::AvlSet;
use log::{info, LevelFilter};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

fn main() {
    TermLogger::init(
        LevelFilter::Trace,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )
    .expect("failed to install logger");

    let mut set: AvlSet<u32> = AvlSet::new();

    for key in [2, 0, 3, 4, 5, 1, 6] {
        set.insert(key);
        set.assert_invariants();
        info!("inserted {key}: {:?} (height {})", set.sequence(), set.height());
    }

    info!(
        "predecessor(7) = {:?}, successor(7) = {:?}",
        set.predecessor(&7),
        set.successor(&7)
    );

    let zero = set.pop_first();
    assert_eq!(zero, Some(0));
    set.assert_invariants();

    for key in [3, 5] {
        set.remove(&key);
        set.assert_invariants();
        info!("removed {key}: {set:?} (height {})", set.height());
    }

    let mut dot = String::new();
    set.dotgraph("demo", &mut dot).expect("formatting into a String cannot fail");
    println!("{dot}");
}
