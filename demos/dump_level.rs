use macroquad_tiled_level::{ConversionConfig, Map};

// Usage: cargo run --example dump_level [map] [config]
fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let map_path = args
        .next()
        .unwrap_or_else(|| "assets/orthogonal.tmj".to_owned());
    let config = match args.next() {
        Some(path) => ConversionConfig::from_json_file(path)?,
        None => ConversionConfig::from_json_file("assets/level_config.json")?,
    };

    let map = Map::load(&map_path, &config)?;
    let level = &map.level;
    println!(
        "{} ({}, {}x{} tiles of {}x{}, origin {:?})",
        map_path,
        level.config.orientation.as_str(),
        level.config.width,
        level.config.height,
        level.config.tile_w,
        level.config.tile_h,
        level.config.origin_tile,
    );

    for grid in &level.tile_grids {
        println!("grid   #{:<2} {:<16} {} cells", grid.z_order, grid.name, grid.cells.len());
    }
    for image in &level.images {
        println!("image  #{:<2} {:<16} {}", image.z_order, image.name, image.image.display());
    }
    for entity in &level.entities {
        println!(
            "entity {:<4} {:<12} {:?} {} at ({:.1}, {:.1})",
            entity.object_id,
            entity.name,
            entity.category,
            entity.prefab,
            entity.position.x,
            entity.position.y,
        );
    }
    for rel in &level.relationships {
        println!("link   {} -[{}]-> {}", rel.from, rel.property, rel.to);
    }
    println!(
        "{} collisions, {} sectors, {} patrol paths",
        level.collisions.len(),
        level.sectors.len(),
        level.patrols.len()
    );
    for resource in &level.resources {
        println!("load   {}", resource.display());
    }
    for warning in map.all_warnings() {
        println!("warn   {warning}");
    }
    Ok(())
}
