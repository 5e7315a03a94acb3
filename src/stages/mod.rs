// The three probing stages share one shape: given the still-unclaimed node
// ids, mutate the shared InfoTable/HistoryStore, and return the ids that
// remain unclaimed for the next stage. Free functions chained by the
// orchestrator are enough here -- no inheritance needed (design note 9).
//
// Each stage's real-world transport (HTTP GET, SSH exec, ICMP ping) sits
// behind a small trait so tests can substitute a fake one, the way the
// teacher substitutes a recording emitter for its logger channel.

pub mod cmc;
pub mod ping;
pub mod shell;
