pub(super) const ROOT_LONG_ABOUT: &str = "\
Integrity checking for append-only directory trees

Hashcheck records a fingerprint and size for every file in a directory tree and
later tells you which files were added, changed or lost. It is meant for trees that
only ever grow, such as photo archives or document stores, where any change to an
existing file is a sign of damage.

CORE CONCEPTS:

  .hashcheck:
    The committed manifest at the top of a tree. One line per file:
      <fingerprint> <size> <path>
    sorted by path. Paths start with './'. Nested trees with their own manifest
    are recorded by the outer tree like any other file, except that names
    starting with '.' are never recorded.

  .hashcheck.new:
    A candidate manifest left behind by verify, subset or update when they find
    differences. Nothing changes the committed manifest until you run accept.

  Record modes:
    - hash (default): the fingerprint is the SHA-256 of the content
    - metadata (--metadata): the fingerprint is the modification time, which is
      fast but misses a same-size rewrite that keeps the old mtime

TYPICAL WORKFLOW:

  1. Record a tree once:
     $ hashcheck create /archive

  2. After copying in new files, record just those:
     $ hashcheck expand /archive

  3. Periodically check everything:
     $ hashcheck verify /archive

  4. If verify reports changes you expected, record them:
     $ hashcheck accept /archive

COMMANDS:

  create   Record every file of a tree that has no manifest yet.
  expand   Record files missing from the manifest. Existing entries are kept.
  update   Like expand, and propose dropping entries whose files are gone.
  verify   Re-record every file and compare against the manifest.
  subset   Re-record only the files listed in .hashcheck.subset (or --list).
  sample   Re-record a random fraction of the manifest and compare directly.
  accept   Replace the committed manifest with the candidate.
  review   Report trees holding files newer than their manifest.
  backup   Bring the tree named in .hashcheck.backup in line with this one.
  match    List files with identical fingerprint and size across trees.

MANY TREES AT ONCE:

  Every command except create and match accepts --find, which treats each DIR
  as a root and processes every directory below it that holds a manifest:
    $ hashcheck verify --find /archive /photos

EXIT STATUS:

  0    everything clean
  1    changed or lost files, failed samples, or a directory that failed
  2    invalid command line
  3    clean, but a candidate awaits accept or a tree needs verify
  4    a target is not a directory, or --find found no manifests
  255  any other fatal error, such as an unreadable config file

CONFIGURATION:

  An optional TOML file, named by --config or $HASHCHECK_CONFIG:
    mode = \"hash\"          # or \"metadata\"
    sample_rate = 0.01
    sample_seed = 42       # optional, makes sample repeatable
  Command line flags take precedence over the file.

For detailed help on any command, use:
  hashcheck <command> --help
";

pub(super) const SAMPLE_LONG_ABOUT: &str = "\
Re-record a random fraction of the manifest

Each manifest entry is selected independently with probability RATE (default 0.01,
or sample_rate from the config file). Selected files are re-recorded and compared
directly against their entries; a missing file counts as a failure. No candidate
manifest is written, so sample never needs accept.

With --seed (or sample_seed in the config file) the same entries are selected on
every run, which is useful for reproducing a failure.
";

pub(super) const BACKUP_LONG_ABOUT: &str = "\
Synchronize a backup copy of the tree

The backup target is the absolute directory path on the first line of
.hashcheck.backup. The target must already hold a manifest. Its manifest is
compared with this tree's committed manifest; if they differ, the pending copies
and deletions are listed and you are asked to confirm them (skip with --yes).

On confirmation, files lost here are deleted from the target, added and changed
files are copied over with their modification times, and finally the manifest
itself is copied so both sides match.

Backup refuses to run while this tree has a candidate awaiting accept.
";
