//! Cluster scatter plot using Plotters

use crate::model::KMeansModel;
use ndarray::Array2;
use plotters::prelude::*;
use std::path::Path;

/// Color palette for different clusters
static CLUSTER_COLORS: [RGBColor; 5] = [RED, BLUE, GREEN, YELLOW, MAGENTA];

/// Standardized columns on the plot axes: budget vs vote_count
const X_FEATURE: usize = 0;
const Y_FEATURE: usize = 9;

/// Scatter of standardized budget against vote count, colored by cluster,
/// with centroids drawn as squares.
///
/// # Arguments
/// * `features` - The standardized rows the clusterer was fit on
/// * `model` - Fitted K-Means model with cluster assignments
/// * `output_path` - Path to save the PNG plot
pub fn create_cluster_visualization(
    features: &Array2<f64>,
    model: &KMeansModel,
    output_path: &Path,
) -> crate::Result<()> {
    if features.ncols() <= Y_FEATURE {
        anyhow::bail!(
            "Plot needs at least {} feature columns, got {}",
            Y_FEATURE + 1,
            features.ncols()
        );
    }

    let x_values: Vec<f64> = features.column(X_FEATURE).to_vec();
    let y_values: Vec<f64> = features.column(Y_FEATURE).to_vec();

    let x_min = x_values.iter().fold(f64::INFINITY, |a, &b| a.min(b)) - 0.5;
    let x_max = x_values.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b)) + 0.5;
    let y_min = y_values.iter().fold(f64::INFINITY, |a, &b| a.min(b)) - 0.5;
    let y_max = y_values.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b)) + 0.5;

    let root = BitMapBackend::new(output_path, (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    // No text elements, so rendering does not depend on system fonts
    let mut chart = ChartBuilder::on(&root)
        .margin(20)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)?;

    for (i, (&x, &y)) in x_values.iter().zip(y_values.iter()).enumerate() {
        let color = model
            .labels
            .get(i)
            .and_then(|&cluster| CLUSTER_COLORS.get(cluster))
            .unwrap_or(&BLACK);
        chart.draw_series(std::iter::once(Circle::new((x, y), 3, color.filled())))?;
    }

    for (cluster_id, centroid) in model.centroids.outer_iter().enumerate() {
        let (cx, cy) = (centroid[X_FEATURE], centroid[Y_FEATURE]);
        let color = CLUSTER_COLORS.get(cluster_id).unwrap_or(&BLACK);
        chart.draw_series(std::iter::once(Rectangle::new(
            [(cx - 0.1, cy - 0.1), (cx + 0.1, cy + 0.1)],
            color.filled(),
        )))?;
    }

    root.present()?;
    Ok(())
}
