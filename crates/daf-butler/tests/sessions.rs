use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tempfile::TempDir;

use daf_butler::{
    Butler, ButlerContext, ButlerError, ButlerSettings, DataId, FileMapper, GraphError, KeyType, KeyValue, Mapper,
    MapperKind, MapperRegistry, Mode, RepositoryArgs, StorageSet, TagSet,
};
use daf_mapper::{KeyTuples, KeyTypes, Location, MapperInit, MapperResult};
use daf_store::RepositoryCfg;
use daf_types::{RepoRoot, StorageKind};

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct TestObject {
    data: String,
}

fn obj(data: &str) -> TestObject {
    TestObject { data: data.into() }
}

/// A mapper type distinct from `FileMapper`.
struct AlternateMapper;

impl Mapper for AlternateMapper {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }
    fn map(&self, _: &str, _: &DataId, _: bool) -> MapperResult<Option<Location>> {
        Ok(None)
    }
    fn query(&self, _: &str, _: &[&str], _: &DataId) -> MapperResult<KeyTuples> {
        Ok(KeyTuples::new())
    }
    fn keys(&self, _: &str, _: Option<&str>) -> MapperResult<Option<KeyTypes>> {
        Ok(None)
    }
    fn default_level(&self) -> Option<String> {
        None
    }
}

impl MapperKind for AlternateMapper {
    const TYPE_NAME: &'static str = "tests.AlternateMapper";
    fn construct(_: &MapperInit) -> MapperResult<Self> {
        Ok(Self)
    }
}

fn context() -> ButlerContext {
    let mut registry = MapperRegistry::with_builtins();
    registry.register_kind::<AlternateMapper>();
    ButlerContext::new(registry, StorageSet::new(), ButlerSettings::default()).unwrap()
}

fn path(dir: &TempDir, name: &str) -> String {
    dir.path().join(name).to_string_lossy().into_owned()
}

fn writer(root: &str) -> RepositoryArgs {
    RepositoryArgs::new(root)
        .mode(Mode::ReadWrite)
        .mapper("FileMapper")
}

fn bar(n: i64) -> DataId {
    DataId::new().with("bar", n)
}

fn bar_tagged(n: i64, tag: &str) -> DataId {
    bar(n).tagged(tag)
}

fn stored_cfg(ctx: &ButlerContext, root: &str) -> RepositoryCfg {
    ctx.store()
        .load_required(&RepoRoot::parse(root).unwrap())
        .unwrap()
}

fn seed_cfg(ctx: &ButlerContext, root: &str, mapper: &str) {
    let root = RepoRoot::parse(root).unwrap();
    ctx.store()
        .create(&root, &RepositoryCfg::new(&root).with_mapper(mapper))
        .unwrap();
}

fn input_roots(butler: &Butler) -> Vec<String> {
    butler.inputs().map(|n| n.root().to_string()).collect()
}

// ---------------------------------------------------------------
// Basics: a templated input plus a read-write output
// ---------------------------------------------------------------

fn write_raw(root: &str, visit: i64, filter: &str) {
    let file = Path::new(root).join(format!("data/input/raw/raw_v{visit}_f{filter}.json"));
    fs::create_dir_all(file.parent().unwrap()).unwrap();
    fs::write(file, json!({ "naxis1": 1026, "visit": visit }).to_string()).unwrap();
}

fn basics() -> (TempDir, ButlerContext, Butler) {
    let dir = tempfile::tempdir().unwrap();
    let alias = path(&dir, "butlerAlias");
    for (visit, filter) in [(1, "g"), (2, "g"), (3, "r")] {
        write_raw(&alias, visit, filter);
    }

    let ctx = context();
    let input = RepositoryArgs::new(alias.as_str())
        .mapper("FileMapper")
        .mapper_args(json!({
            "default_level": "visit",
            "levels": { "visit": ["visit"] },
            "datasets": {
                "raw": {
                    "template": "data/input/raw/raw_v{visit}_f{filter}.json",
                    "keys": { "visit": "int" }
                }
            }
        }))
        .tags("baArgs");
    let output = writer(&path(&dir, "TestBasics/repoA"));
    let butler = Butler::builder(&ctx).input(input).output(output).build().unwrap();
    (dir, ctx, butler)
}

#[test]
fn basics_get() {
    let (_dir, _ctx, butler) = basics();
    let raw = butler
        .get("raw", &DataId::new().with("visit", "2").with("filter", "g"))
        .unwrap();
    assert_eq!(raw["naxis1"], 1026);
}

#[test]
fn basics_subset() {
    let (_dir, _ctx, butler) = basics();
    assert_eq!(butler.subset("raw", None, &DataId::new()).unwrap().len(), 3);
}

#[test]
fn basics_get_keys() {
    let (_dir, _ctx, butler) = basics();
    for tags in [
        TagSet::new(),
        TagSet::from("baArgs"),
        TagSet::from(["baArgs", "foo"]),
    ] {
        let keys = butler.get_keys("raw", None, &tags).unwrap().unwrap();
        assert_eq!(keys.get("filter"), Some(&KeyType::Str));
        assert_eq!(keys.get("visit"), Some(&KeyType::Int));
    }
    assert!(butler.get_keys("raw", None, &TagSet::from("foo")).unwrap().is_none());
}

#[test]
fn basics_query_metadata() {
    let (_dir, _ctx, butler) = basics();
    let values = |key: &str, id: DataId| {
        let mut v = butler.query_values("raw", key, &id).unwrap();
        v.sort();
        v
    };
    let ints = |xs: &[i64]| xs.iter().map(|x| KeyValue::Int(*x)).collect::<Vec<_>>();

    assert_eq!(values("filter", DataId::new()), [KeyValue::from("g"), KeyValue::from("r")]);
    assert_eq!(values("visit", DataId::new()), ints(&[1, 2, 3]));
    assert_eq!(values("visit", DataId::new().with("filter", "g")), ints(&[1, 2]));
    assert_eq!(values("visit", DataId::new().with("filter", "r")), ints(&[3]));
    assert_eq!(values("filter", DataId::new().with("visit", 1)), [KeyValue::from("g")]);
    assert_eq!(values("filter", DataId::new().with("visit", 3)), [KeyValue::from("r")]);
    assert!(values("visit", DataId::new().with("filter", "h")).is_empty());
    assert_eq!(
        values("visit", DataId::new().with("filter", "g").tagged("baArgs")),
        ints(&[1, 2])
    );
    assert!(values("visit", DataId::new().with("filter", "g").tagged("foo")).is_empty());

    let pairs = butler.query_metadata("raw", &["visit", "filter"], &DataId::new()).unwrap();
    assert_eq!(pairs.len(), 3);
}

#[test]
fn basics_dataset_exists() {
    let (_dir, _ctx, butler) = basics();
    let exists = |filter: &str, visit: i64| {
        butler
            .dataset_exists("raw", &DataId::new().with("filter", filter).with("visit", visit))
            .unwrap()
    };
    assert!(exists("g", 1));
    assert!(exists("g", 2));
    assert!(exists("r", 3));
    assert!(!exists("f", 1));
    assert!(!exists("r", 1));
    assert!(!exists("g", 3));
}

#[test]
fn basics_output_is_searched_first() {
    let (dir, _ctx, butler) = basics();
    let roots = input_roots(&butler);
    assert_eq!(roots, [path(&dir, "TestBasics/repoA"), path(&dir, "butlerAlias")]);
    // The synthesized input configuration is not persisted.
    assert!(!dir.path().join("butlerAlias/repositoryCfg.yaml").exists());
}

// ---------------------------------------------------------------
// Masking
// ---------------------------------------------------------------

#[test]
fn nearer_repository_masks_farther() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context();
    let a = path(&dir, "a");
    let b = path(&dir, "b");

    Butler::builder(&ctx)
        .output(writer(&a))
        .build()
        .unwrap()
        .put(&obj("a"), "foo", &bar(1))
        .unwrap();
    Butler::builder(&ctx)
        .input(a.as_str())
        .output(writer(&b))
        .build()
        .unwrap()
        .put(&obj("b"), "foo", &bar(1))
        .unwrap();
    assert_eq!(stored_cfg(&ctx, &b).parents, [a.clone()]);

    let butler = Butler::open(&ctx, [b.as_str(), a.as_str()], Vec::<RepositoryArgs>::new()).unwrap();
    assert_eq!(butler.get_as::<TestObject>("foo", &bar(1)).unwrap(), obj("b"));

    let butler = Butler::open(&ctx, [a.as_str(), b.as_str()], Vec::<RepositoryArgs>::new()).unwrap();
    assert_eq!(butler.get_as::<TestObject>("foo", &bar(1)).unwrap(), obj("a"));

    let butler = Butler::builder(&ctx).input(b.as_str()).build().unwrap();
    assert_eq!(input_roots(&butler), [b.clone(), a.clone()]);
    assert_eq!(butler.get_as::<TestObject>("foo", &bar(1)).unwrap(), obj("b"));
}

// ---------------------------------------------------------------
// Fan-out to several outputs
// ---------------------------------------------------------------

#[test]
fn put_reaches_every_output() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context();
    let first = path(&dir, "first");
    let second = path(&dir, "second");

    let butler = Butler::builder(&ctx)
        .output(writer(&first))
        .output(RepositoryArgs::new(second.as_str()).mapper(FileMapper::TYPE_NAME))
        .build()
        .unwrap();
    butler.put(&obj("shared"), "foo", &bar(1)).unwrap();
    drop(butler);

    for root in [&first, &second] {
        let butler = Butler::builder(&ctx).input(root.as_str()).build().unwrap();
        assert_eq!(butler.get_as::<TestObject>("foo", &bar(1)).unwrap(), obj("shared"));
    }
}

// ---------------------------------------------------------------
// Tagging
// ---------------------------------------------------------------

#[test]
fn tagged_inputs_and_their_parents() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context();
    let repo = |n: u32| path(&dir, &format!("TestTagging/repo{n}"));
    let get = |butler: &Butler, id: DataId| butler.get_as::<TestObject>("foo", &id).unwrap();

    Butler::builder(&ctx)
        .output(writer(&repo(1)))
        .build()
        .unwrap()
        .put(&obj("a"), "foo", &bar(1))
        .unwrap();
    Butler::builder(&ctx)
        .output(writer(&repo(2)))
        .build()
        .unwrap()
        .put(&obj("b"), "foo", &bar(1))
        .unwrap();

    let repo1 = RepositoryArgs::new(repo(1)).tags("one");
    let repo2 = RepositoryArgs::new(repo(2)).tags("two");

    let butler = Butler::builder(&ctx)
        .inputs([repo1.clone(), repo2.clone()])
        .build()
        .unwrap();
    assert_eq!(get(&butler, bar_tagged(1, "one")), obj("a"));
    assert_eq!(get(&butler, bar_tagged(1, "two")), obj("b"));
    assert_eq!(get(&butler, bar(1)), obj("a"));

    let butler = Butler::builder(&ctx)
        .inputs([repo2.clone(), repo1.clone()])
        .build()
        .unwrap();
    assert_eq!(get(&butler, bar_tagged(1, "one")), obj("a"));
    assert_eq!(get(&butler, bar_tagged(1, "two")), obj("b"));
    assert_eq!(get(&butler, bar(1)), obj("b"));

    // A read-write output comes first but carries no tag.
    let butler = Butler::builder(&ctx)
        .inputs([repo1.clone(), repo2.clone()])
        .output(writer(&repo(3)))
        .build()
        .unwrap();
    assert_eq!(get(&butler, bar_tagged(1, "one")), obj("a"));
    assert_eq!(get(&butler, bar_tagged(1, "two")), obj("b"));
    assert_eq!(get(&butler, bar(1)), obj("a"));
    butler.put(&obj("c"), "foo", &bar(1)).unwrap();
    assert_eq!(get(&butler, bar(1)), obj("c"));
    assert_eq!(get(&butler, bar_tagged(1, "one")), obj("a"));
    assert_eq!(get(&butler, bar_tagged(1, "two")), obj("b"));
    drop(butler);
    assert_eq!(stored_cfg(&ctx, &repo(3)).parents, [repo(1), repo(2)]);

    // repo4 (parents repo1, repo2) and repo5 side by side.
    Butler::builder(&ctx)
        .inputs([repo(1), repo(2)])
        .output(writer(&repo(4)))
        .build()
        .unwrap()
        .put(&obj("d"), "foo", &bar(2))
        .unwrap();
    Butler::builder(&ctx)
        .output(writer(&repo(5)))
        .build()
        .unwrap()
        .put(&obj("e"), "foo", &bar(1))
        .unwrap();

    let repo4 = RepositoryArgs::new(repo(4)).tags("four");
    let repo5 = RepositoryArgs::new(repo(5)).tags("five");

    let butler = Butler::builder(&ctx)
        .inputs([repo4.clone(), repo5.clone()])
        .build()
        .unwrap();
    assert_eq!(get(&butler, bar(1)), obj("a"));
    assert_eq!(get(&butler, bar(2)), obj("d"));
    assert_eq!(get(&butler, bar_tagged(1, "four")), obj("a"));
    assert_eq!(get(&butler, bar_tagged(1, "five")), obj("e"));

    let butler = Butler::builder(&ctx).inputs([repo5, repo4]).build().unwrap();
    assert_eq!(get(&butler, bar(1)), obj("e"));
    assert_eq!(get(&butler, bar(2)), obj("d"));
    assert_eq!(get(&butler, bar_tagged(1, "four")), obj("a"));
    assert_eq!(get(&butler, bar_tagged(1, "five")), obj("e"));

    let err = butler.get("foo", &bar_tagged(1, "six")).unwrap_err();
    assert!(matches!(err, ButlerError::NotFound { .. }));
}

// ---------------------------------------------------------------
// Mapper inference
// ---------------------------------------------------------------

#[test]
fn single_parent_mapper_is_inherited() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context();
    let a = path(&dir, "repoA");
    seed_cfg(&ctx, &a, FileMapper::TYPE_NAME);

    let butler = Butler::builder(&ctx)
        .input(a.as_str())
        .output(RepositoryArgs::new(path(&dir, "repoB")).mode(Mode::ReadWrite))
        .build()
        .unwrap();
    let out = butler.outputs().next().unwrap();
    assert_eq!(out.mapper().unwrap().type_name(), FileMapper::TYPE_NAME);
}

#[test]
fn same_mapper_in_every_parent_is_inherited() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context();
    let a = path(&dir, "repoA");
    let b = path(&dir, "repoB");
    seed_cfg(&ctx, &a, FileMapper::TYPE_NAME);
    seed_cfg(&ctx, &b, "FileMapper");

    let butler = Butler::builder(&ctx)
        .inputs([a.as_str(), b.as_str()])
        .output(path(&dir, "repoC"))
        .build()
        .unwrap();
    let out = butler.outputs().next().unwrap();
    assert_eq!(out.mapper().unwrap().type_name(), FileMapper::TYPE_NAME);
}

#[test]
fn differing_parent_mappers_fail() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context();
    let a = path(&dir, "repoA");
    let b = path(&dir, "repoB");
    seed_cfg(&ctx, &a, FileMapper::TYPE_NAME);
    seed_cfg(&ctx, &b, AlternateMapper::TYPE_NAME);

    let err = Butler::builder(&ctx)
        .inputs([a.as_str(), b.as_str()])
        .output(path(&dir, "repoC"))
        .build()
        .unwrap_err();
    assert!(matches!(err, ButlerError::Graph(GraphError::AmbiguousMapper { .. })));
    assert!(!dir.path().join("repoC/repositoryCfg.yaml").exists());
}

// ---------------------------------------------------------------
// Relocation
// ---------------------------------------------------------------

#[test]
fn moved_configuration_loads_with_new_root() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context();
    let a = path(&dir, "TestMovedRepositoryCfg/a");
    let b = path(&dir, "TestMovedRepositoryCfg/b");

    Butler::builder(&ctx)
        .output(RepositoryArgs::new(a.as_str()).mapper(FileMapper::TYPE_NAME))
        .build()
        .unwrap();
    fs::create_dir_all(&b).unwrap();
    fs::rename(
        Path::new(&a).join("repositoryCfg.yaml"),
        Path::new(&b).join("repositoryCfg.yaml"),
    )
    .unwrap();

    let butler = Butler::builder(&ctx).input(b.as_str()).build().unwrap();
    let node = butler.inputs().next().unwrap();
    let expected = RepositoryCfg {
        root: b.clone(),
        mapper: Some(FileMapper::TYPE_NAME.to_string()),
        mapper_args: None,
        storage: StorageKind::Posix,
        parents: Vec::new(),
    };
    assert_eq!(butler.graph().cfg(node.id()), &expected);
}

#[test]
fn moved_memory_repository_loads_with_new_root() {
    let memory = std::sync::Arc::new(daf_butler::MemoryStorage::new());
    let ctx = ButlerContext::new(
        MapperRegistry::with_builtins(),
        StorageSet::new().with_memory(memory.clone()),
        ButlerSettings::default(),
    )
    .unwrap();
    Butler::builder(&ctx)
        .output(writer("mem://old"))
        .build()
        .unwrap()
        .put(&obj("kept"), "foo", &bar(1))
        .unwrap();
    assert!(memory.rename_dir("old", "new").unwrap() >= 2);

    let butler = Butler::builder(&ctx).input("mem://new").build().unwrap();
    let node = butler.inputs().next().unwrap();
    assert_eq!(butler.graph().cfg(node.id()).root, "mem://new");
    assert_eq!(butler.get_as::<TestObject>("foo", &bar(1)).unwrap(), obj("kept"));
}

// ---------------------------------------------------------------
// Outputs that already have parents
// ---------------------------------------------------------------

#[test]
fn output_already_has_parent() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context();
    let a = path(&dir, "TestOutputAlreadyHasParent/a");
    let b = path(&dir, "TestOutputAlreadyHasParent/b");
    let expected_b = RepositoryCfg {
        root: b.clone(),
        mapper: Some(FileMapper::TYPE_NAME.to_string()),
        mapper_args: None,
        storage: StorageKind::Posix,
        parents: vec![a.clone()],
    };

    Butler::builder(&ctx)
        .output(RepositoryArgs::new(a.as_str()).mapper(FileMapper::TYPE_NAME))
        .build()
        .unwrap();

    let butler = Butler::builder(&ctx).input(a.as_str()).output(b.as_str()).build().unwrap();
    assert_eq!(input_roots(&butler), [a.clone()]);
    assert_eq!(butler.outputs().count(), 1);
    assert_eq!(butler.outputs().next().unwrap().root().to_string(), b);

    // Listing `a` again is redundant: it is already a parent of `b`.
    for _ in 0..4 {
        let butler = Butler::builder(&ctx)
            .input(a.as_str())
            .output(RepositoryArgs::new(b.as_str()).mode(Mode::ReadWrite))
            .build()
            .unwrap();
        assert_eq!(input_roots(&butler), [b.clone(), a.clone()]);
        assert_eq!(butler.outputs().count(), 1);
        assert_eq!(stored_cfg(&ctx, &b), expected_b);
    }

    for _ in 0..4 {
        let butler = Butler::builder(&ctx)
            .output(RepositoryArgs::new(b.as_str()).mode(Mode::ReadWrite))
            .build()
            .unwrap();
        assert_eq!(input_roots(&butler), [b.clone(), a.clone()]);
        assert_eq!(stored_cfg(&ctx, &b), expected_b);
    }

    // Write-only: the parent is not searched.
    let butler = Butler::builder(&ctx).output(b.as_str()).build().unwrap();
    assert_eq!(butler.inputs().count(), 0);
    assert_eq!(butler.outputs().count(), 1);
}

// ---------------------------------------------------------------
// Construction errors
// ---------------------------------------------------------------

#[test]
fn existing_configuration_conflicts_with_override() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context();
    let a = path(&dir, "a");
    seed_cfg(&ctx, &a, FileMapper::TYPE_NAME);

    let err = Butler::builder(&ctx)
        .output(RepositoryArgs::new(a.as_str()).mapper(AlternateMapper::TYPE_NAME))
        .build()
        .unwrap_err();
    assert!(matches!(
        err,
        ButlerError::Graph(GraphError::ConfigMismatch { field: "mapper", .. })
    ));
}

#[test]
fn unknown_input_root_fails() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context();
    let err = Butler::builder(&ctx)
        .input(path(&dir, "nowhere"))
        .build()
        .unwrap_err();
    assert!(matches!(err, ButlerError::Graph(GraphError::ConfigNotFound(_))));
}

#[test]
fn settings_rename_the_configuration_record() {
    let dir = tempfile::tempdir().unwrap();
    let settings = ButlerSettings::from_toml_str("config_file_name = \"repo.yaml\"\n").unwrap();
    let ctx = ButlerContext::with_settings(settings).unwrap();
    let a = path(&dir, "a");
    Butler::builder(&ctx).output(writer(&a)).build().unwrap();
    assert!(dir.path().join("a/repo.yaml").exists());
    assert!(!dir.path().join("a/repositoryCfg.yaml").exists());
}

#[test]
fn values_that_leave_the_repository_are_refused() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context();
    let out = path(&dir, "out");
    let butler = Butler::builder(&ctx).output(writer(&out)).build().unwrap();

    let id = DataId::new().with("bar", "x/../../../escaped");
    let err = butler.put(&obj("stray"), "foo", &id).unwrap_err();
    assert!(matches!(
        err,
        ButlerError::Mapper(daf_mapper::MapperError::InvalidValue { .. })
    ));
    assert!(butler.get_as::<TestObject>("foo", &id).is_err());
    assert!(!dir.path().join("escaped.json").exists());
    assert!(!dir.path().parent().unwrap().join("escaped.json").exists());
}

#[test]
fn numeric_looking_values_keep_their_spelling() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context();
    let out = path(&dir, "out");
    let butler = Butler::builder(&ctx).output(writer(&out)).build().unwrap();

    let padded = DataId::new().with("bar", "007");
    butler.put(&obj("padded"), "foo", &padded).unwrap();
    butler.put(&obj("plain"), "foo", &bar(7)).unwrap();

    assert_eq!(
        butler.query_values("foo", "bar", &DataId::new()).unwrap(),
        [KeyValue::Int(7), KeyValue::Str("007".into())]
    );
    assert!(butler.dataset_exists("foo", &padded).unwrap());
    assert_eq!(butler.get_as::<TestObject>("foo", &padded).unwrap(), obj("padded"));
    assert_eq!(butler.get_as::<TestObject>("foo", &bar(7)).unwrap(), obj("plain"));
}
