/*!

# Manual: input format and pipeline behavior

`fuzzy_tally` processes a plain text file with one vote record per line:

```text
id: 17, time: 2024-03-01 10:15:22, ip: 203.0.113.7, candidate: John Smith
```

The four fields must appear in this order. `id` is one or more digits,
`time` is free text (it may itself contain commas), `ip` is any token of
digits and dots, and `candidate` runs to the end of the line. Lines that do
not match the grammar are skipped and counted, never reported as errors.

The ip token is intentionally permissive: `999.999.999.999` is accepted.
Duplicate detection is plain string equality on the id and on the ip, so no
IPv4 semantics are implied anywhere.

## Pipeline

1. **Deduplication.** The file is streamed line by line. A record whose id
   or ip was already seen on an earlier retained record is dropped. The
   first submission wins.
2. **Center selection.** Distinct candidate names are ranked by descending
   occurrence count (ties keep first-seen order). The top 200 names are
   kept and filtered down to plausible personal names: at least two tokens,
   each starting with an uppercase letter.
3. **Clustering.** Every selected center absorbs the names within two
   character edits (and at most two characters of length difference) of it,
   scanning names in first-seen order. Earlier centers claim contested
   names. Names no center claims become singleton clusters of their own, so
   the clusters always cover every observed name exactly once.
4. **Aggregation.** Each deduplicated record credits one vote to the
   cluster containing its candidate name. The tally is reported per cluster
   center, ranked by descending votes, with percentages of the total.

## Using the library

```
use fuzzy_tally::{dedupe, run_pipeline};

let deduped = dedupe([
    "id: 1, time: t1, ip: 1.1.1.1, candidate: John Smith",
    "id: 2, time: t2, ip: 2.2.2.2, candidate: Jon Smith",
]);
let result = run_pipeline(&deduped.records);
assert_eq!(result.report.total_votes, 2);
```

Reading from a file instead goes through `load_and_dedupe`, which fails
only when the file cannot be read.

*/
